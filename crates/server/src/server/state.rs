//! Shared state injected into handlers and middleware.

use std::sync::Arc;

use bytes::Bytes;
use metrics_exporter_prometheus::PrometheusHandle;

/// State for the two content routes.
///
/// The page is rendered once at bootstrap; handlers only clone the buffer.
#[derive(Clone)]
pub struct ContentState {
    pub page: Bytes,
}

impl ContentState {
    pub fn new(page: String) -> Self {
        Self {
            page: Bytes::from(page),
        }
    }
}

/// Base-path scope for request metric collection.
#[derive(Clone, Debug)]
pub struct MetricsScope {
    base: Arc<str>,
}

impl MetricsScope {
    pub fn new(base: &str) -> Self {
        Self { base: base.into() }
    }

    /// Whether `path` lies under the configured base path.
    pub fn covers(&self, path: &str) -> bool {
        let base = &*self.base;
        base.is_empty()
            || path == base
            || path
                .strip_prefix(base)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Handle used by the metrics route to render the Prometheus exposition.
#[derive(Clone)]
pub struct MetricsState {
    pub handle: PrometheusHandle,
}
