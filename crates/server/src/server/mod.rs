//! HTTP server bootstrap.
//!
//! [`start`] is the one entry point: it assembles the router, loads TLS
//! material and binds the listener, strictly in that order. Any failure is
//! returned before a single connection is accepted.

pub mod handlers;
pub mod html;
pub mod listener;
pub mod middleware;
pub mod router;
pub mod state;
pub mod tls;

use anyhow::{Context, Result};
use axum::Router;
use common::config::{JwtConfig, ServerConfig, SslConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

pub use listener::ListenerHandle;

/// Mount the server's routes and middleware onto `app`, then start serving.
///
/// `app` carries any routes the caller owns (e.g. the terminal socket); they
/// sit behind the same fingerprint-stripping and metrics layers.
///
/// # Errors
///
/// Returns an error if the base path is unusable, TLS material cannot be read
/// or parsed, or the listen address cannot be bound.
pub async fn start(
    app: Router,
    server: &ServerConfig,
    ssl: Option<&SslConfig>,
    jwt: &JwtConfig,
    metrics: PrometheusHandle,
) -> Result<ListenerHandle> {
    let base = router::normalize_base(&server.base)?;
    let app = router::build(app, server, jwt, metrics)?;

    let tls = match tls::load(ssl).await.context("failed to load TLS material")? {
        Some(buffer) => Some(tls::build_server_config(&buffer).context("invalid TLS material")?),
        None => None,
    };
    info!(jwt = jwt.enable, tls = tls.is_some(), "server assembled");

    listener::listen(app, &server.host, server.port, &base, tls).await
}
