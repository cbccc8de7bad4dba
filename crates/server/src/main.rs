//! `webtty`: web terminal server entry point.
//!
//! Startup sequence:
//! 1. Capture [`ConfigDefaults`] from built-in constants and the environment.
//! 2. Parse the command line.
//! 3. Resolve the effective [`Config`](common::Config) (defaults < file < flags).
//! 4. Initialise logging and the metrics recorder.
//! 5. Assemble the router, load TLS material and start listening.
//! 6. Run until Ctrl-C, then stop accepting and drain.

mod auth;
mod cli;
mod server;
mod telemetry;

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use common::ConfigDefaults;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Defaults
    // -----------------------------------------------------------------------
    let defaults = ConfigDefaults::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: environment defaults invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Command line
    // -----------------------------------------------------------------------
    let cli = cli::Cli::parse();

    // -----------------------------------------------------------------------
    // 3. Configuration
    // -----------------------------------------------------------------------
    let cfg = common::resolve(&defaults, cli.conf.as_deref(), &cli.overrides()).map_err(|e| {
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 4. Telemetry
    // -----------------------------------------------------------------------
    let metrics = telemetry::init_telemetry(cfg.log_level)?;
    // Serialisation skips ssh.pass and jwt.secret.
    let effective = serde_json::to_string(&cfg).context("failed to serialise configuration")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %effective,
        "webtty starting"
    );

    // -----------------------------------------------------------------------
    // 5. HTTP server
    // -----------------------------------------------------------------------
    let running = server::start(
        Router::new(),
        &cfg.server,
        cfg.ssl.as_ref(),
        &cfg.jwt,
        metrics,
    )
    .await?;
    info!(addr = %running.local_addr(), tls = running.is_tls(), "ready");

    // -----------------------------------------------------------------------
    // 6. Shutdown
    // -----------------------------------------------------------------------
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutdown requested");
    running.shutdown();
    running.wait().await
}
