//! Axum router construction.
//!
//! Middleware order, outermost first:
//!
//! 1. fingerprint-header stripping
//! 2. request metrics (scoped to the base path)
//! 3. `{base}/metrics`
//! 4. `{base}/client` static assets
//! 5. request logging
//! 6. response compression
//! 7. favicon, security headers, trailing-slash redirect
//! 8. content routes, JWT-gated when enabled
//!
//! Steps 3 and 4 sit outside 5 to 7, so asset and metrics requests are neither
//! logged nor compressed.

use std::{path::Path, sync::Arc};

use anyhow::{bail, Result};
use axum::{
    http::{header, HeaderValue},
    middleware,
    routing::get,
    Router,
};
use common::config::{JwtConfig, ServerConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{
    compression::CompressionLayer,
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeaderLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, Level};

use super::{
    handlers::{self, CLIENT_ASSETS_DIR},
    html, middleware as mw,
    state::{ContentState, MetricsScope, MetricsState},
};
use crate::auth::{self, AuthGate};

/// Characters the router would read as path syntax, or that can never
/// appear in a request path.
const BASE_RESERVED: [char; 4] = [':', '*', '?', '#'];

/// Strip trailing slashes and make sure a non-empty base starts with `/`.
/// A base of `/` becomes the empty prefix.
///
/// # Errors
///
/// Returns an error if the base contains route parameter syntax (`:`, `*`)
/// or a query/fragment delimiter.
pub fn normalize_base(base: &str) -> Result<String> {
    if let Some(c) = base.chars().find(|c| BASE_RESERVED.contains(c)) {
        bail!("invalid base path {base:?}: {c:?} is not allowed");
    }
    let trimmed = base.trim().trim_end_matches('/');
    Ok(if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    })
}

/// Extend `app` with every route and middleware layer the server needs.
///
/// # Errors
///
/// Returns an error if `server.base` is not a usable path prefix.
pub fn build(
    app: Router,
    server: &ServerConfig,
    jwt: &JwtConfig,
    metrics: PrometheusHandle,
) -> Result<Router> {
    let base = normalize_base(&server.base)?;

    let content = content_routes(&base, &server.title, jwt)
        .route_service(
            &format!("{base}/favicon.ico"),
            ServeFile::new(Path::new(CLIENT_ASSETS_DIR).join("favicon.ico")),
        )
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            Arc::<str>::from(base.as_str()),
            mw::redirect,
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            mw::frame_options(server.allow_iframe),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            mw::content_security_policy(server.allow_iframe),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer-when-downgrade"),
        ))
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(app
        .route(
            &format!("{base}/metrics"),
            get(handlers::metrics).with_state(MetricsState { handle: metrics }),
        )
        .nest_service(&format!("{base}/client"), ServeDir::new(CLIENT_ASSETS_DIR))
        .merge(content)
        .layer(middleware::from_fn_with_state(
            MetricsScope::new(&base),
            mw::track_metrics,
        ))
        .layer(middleware::map_response(mw::strip_fingerprint)))
}

/// The two content routes. With JWT enabled they are registered behind the
/// gate; with JWT disabled the handler is bound directly and the gate does
/// not exist at all.
fn content_routes(base: &str, title: &str, jwt: &JwtConfig) -> Router {
    let root = if base.is_empty() { "/" } else { base };
    let routes = Router::new()
        .route(root, get(handlers::content))
        .route(&format!("{base}/ssh/:user"), get(handlers::content))
        .with_state(ContentState::new(html::render(base, title)));

    if jwt.enable {
        debug!(algorithms = ?jwt.algorithms, "content routes require a token");
        let gate = Arc::new(AuthGate::new(jwt));
        routes.route_layer(middleware::from_fn_with_state(gate, auth::require_token))
    } else {
        debug!("content routes are open");
        routes
    }
}
