//! Effective configuration for the web terminal server.
//!
//! A [`Config`] is produced exactly once at startup by [`resolve`], which
//! layers three sources, narrowest wins:
//!
//! 1. [`ConfigDefaults`]: built-in constants plus environment variables read
//!    once at process start.
//! 2. An optional JSON5 config file.
//! 3. Command-line overrides ([`CliOptions`]).
//!
//! After resolution every field holds a value. Optional values (`ssh.pass`,
//! `ssh.key`, `ssh.config`, `ssl`) use `None` as the explicit absent marker.

pub mod coerce;
pub mod defaults;
pub mod resolve;

pub use defaults::ConfigDefaults;
pub use resolve::{resolve, CliOptions};

use std::{fmt, path::PathBuf, str::FromStr};

use serde::Serialize;

/// Fully resolved, immutable configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub ssh: SshConfig,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    /// TLS material; `None` means "serve plain HTTP".
    pub ssl: Option<SslConfig>,
    /// Shell command run for local sessions.
    pub command: String,
    pub force_ssh: bool,
    pub log_level: LogLevel,
}

/// SSH connection parameters handed to the terminal bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SshConfig {
    pub user: String,
    pub host: String,
    /// Authentication mode, e.g. `"password"` or `"publickey"`.
    pub auth: String,
    #[serde(skip_serializing)]
    pub pass: Option<String>,
    pub key: Option<String>,
    pub port: u16,
    pub known_hosts: String,
    pub allow_remote_hosts: bool,
    pub allow_remote_command: bool,
    /// Path to an `ssh_config` file.
    pub config: Option<String>,
}

/// HTTP listener parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    /// URL prefix all routes are mounted under, e.g. `"/wetty/"`.
    pub base: String,
    pub port: u16,
    /// Bind address or hostname.
    pub host: String,
    /// `<title>` of the served terminal page.
    pub title: String,
    /// Allow the page to be embedded in a cross-origin iframe.
    pub allow_iframe: bool,
}

/// Token gating for the content routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JwtConfig {
    pub enable: bool,
    #[serde(skip_serializing)]
    pub secret: String,
    /// Accepted signing algorithms in configured order, without duplicates.
    pub algorithms: Vec<String>,
    /// Lifetime of issued tokens, e.g. `"1h"`.
    pub expires_in: String,
}

/// Paths to PEM-encoded TLS material. Only constructed when both are known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SslConfig {
    pub key: PathBuf,
    pub cert: PathBuf,
}

// ---------------------------------------------------------------------------
// Log level
// ---------------------------------------------------------------------------

/// Log severities, ordered from least to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Http,
    Verbose,
    Debug,
    Silly,
}

impl LogLevel {
    /// Every level, least verbose first.
    pub const ALL: [LogLevel; 7] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Http,
        LogLevel::Verbose,
        LogLevel::Debug,
        LogLevel::Silly,
    ];

    /// Level used when nothing else is configured: `debug` in a development
    /// (debug-assertions) build, `http` otherwise.
    pub fn process_default() -> Self {
        if cfg!(debug_assertions) {
            LogLevel::Debug
        } else {
            LogLevel::Http
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Http => "http",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
            LogLevel::Silly => "silly",
        }
    }

    /// `tracing` filter directive that corresponds to this level.
    ///
    /// `http` keeps application logs at `info` but lets per-request logs from
    /// `tower_http` through.
    pub fn filter_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Http => "info,tower_http=debug",
            LogLevel::Verbose | LogLevel::Debug => "debug",
            LogLevel::Silly => "trace",
        }
    }
}

/// Returned when a string is not one of the seven level names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLogLevel(pub String);

impl fmt::Display for UnknownLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown log level: {}", self.0)
    }
}

impl std::error::Error for UnknownLogLevel {}

impl FromStr for LogLevel {
    type Err = UnknownLogLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| UnknownLogLevel(s.to_owned()))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
