//! Tracing subscriber and Prometheus recorder initialisation.

use anyhow::{anyhow, Result};
use common::LogLevel;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;

/// Initialise logging and the global metrics recorder.
///
/// Returns the handle the `/metrics` route renders from.
///
/// # Errors
///
/// Returns an error if a subscriber or recorder has already been installed.
pub fn init_telemetry(log_level: LogLevel) -> Result<PrometheusHandle> {
    init_tracing(log_level)?;
    install_metrics_recorder()
}

fn init_tracing(log_level: LogLevel) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.filter_directive()));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow!("failed to initialise tracing subscriber: {e}"))
}

/// Install a Prometheus recorder as the global `metrics` recorder.
fn install_metrics_recorder() -> Result<PrometheusHandle> {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|_| anyhow!("a global metrics recorder is already installed"))?;
    Ok(handle)
}
