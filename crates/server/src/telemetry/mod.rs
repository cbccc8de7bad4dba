//! Structured logging and metrics recorder setup.
//!
//! Logs are JSON lines on stdout. `RUST_LOG` overrides the configured
//! [`LogLevel`](common::LogLevel) when set. Metrics go to an in-process
//! Prometheus recorder scraped through `{base}/metrics`.
//!
//! No secrets (`ssh.pass`, `jwt.secret`, tokens) may appear in any log field
//! or metric label.

pub mod init;

pub use init::init_telemetry;
