//! Built-in defaults, optionally seeded from environment variables.
//!
//! The environment is read once, when [`ConfigDefaults::from_env`] is called
//! at startup. The resulting value is immutable and passed explicitly to
//! [`resolve`](super::resolve); nothing re-reads the environment later.

use std::collections::HashMap;

use serde::Deserialize;

use super::{coerce, Config, JwtConfig, LogLevel, ServerConfig, SshConfig};

pub const DEFAULT_SSH_HOST: &str = "localhost";
pub const DEFAULT_SSH_AUTH: &str = "password";
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_KNOWN_HOSTS: &str = "/dev/null";
pub const DEFAULT_BASE: &str = "/wetty/";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_TITLE: &str = "WeTTY - The Web Terminal Emulator";
pub const DEFAULT_COMMAND: &str = "login";
pub const DEFAULT_JWT_SECRET: &str = "your-jwt-secret-key";
pub const DEFAULT_JWT_ALGORITHMS: &str = "HS256";
pub const DEFAULT_JWT_EXPIRES_IN: &str = "1h";

/// Process-wide defaults for every configurable field except `ssl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDefaults {
    pub ssh: SshConfig,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub command: String,
    pub force_ssh: bool,
    pub log_level: LogLevel,
}

/// Environment variables that seed the defaults.
///
/// The `config` crate lowercases environment keys, so `JWT_ENABLE` arrives
/// as `jwt_enable`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EnvDefaults {
    sshuser: Option<String>,
    sshhost: Option<String>,
    sshauth: Option<String>,
    sshpass: Option<String>,
    sshkey: Option<String>,
    sshport: Option<String>,
    knownhosts: Option<String>,
    sshconfig: Option<String>,
    base: Option<String>,
    port: Option<String>,
    title: Option<String>,
    allowiframe: Option<String>,
    forcessh: Option<String>,
    command: Option<String>,
    jwt_enable: Option<String>,
    jwt_secret: Option<String>,
    jwt_algorithms: Option<String>,
    jwt_expires_in: Option<String>,
}

impl ConfigDefaults {
    /// Capture defaults from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment cannot be collected into the
    /// expected shape.
    pub fn from_env() -> Result<Self, ::config::ConfigError> {
        Self::from_source(None)
    }

    /// Capture defaults from an explicit variable map instead of the real
    /// environment. `None` reads the process environment.
    pub fn from_source(vars: Option<HashMap<String, String>>) -> Result<Self, ::config::ConfigError> {
        let env: EnvDefaults = ::config::Config::builder()
            .add_source(::config::Environment::default().source(vars))
            .build()?
            .try_deserialize()?;
        Ok(Self::from_vars(env))
    }

    /// Defaults with no environment influence at all.
    pub fn builtin() -> Self {
        Self::from_vars(EnvDefaults::default())
    }

    fn from_vars(env: EnvDefaults) -> Self {
        // Empty variables behave as if unset.
        let var = |v: Option<String>| v.filter(|s| !s.is_empty());
        let flag = |v: Option<String>| var(v).as_deref() == Some("true");
        let port = |v: Option<String>, fallback: u16| {
            var(v).and_then(|s| s.trim().parse().ok()).unwrap_or(fallback)
        };

        let algorithms = var(env.jwt_algorithms)
            .and_then(|s| coerce::to_algorithms(&serde_json::Value::String(s)))
            .unwrap_or_else(|| vec![DEFAULT_JWT_ALGORITHMS.to_owned()]);

        Self {
            ssh: SshConfig {
                user: var(env.sshuser).unwrap_or_default(),
                host: var(env.sshhost).unwrap_or_else(|| DEFAULT_SSH_HOST.into()),
                auth: var(env.sshauth).unwrap_or_else(|| DEFAULT_SSH_AUTH.into()),
                pass: var(env.sshpass),
                key: var(env.sshkey),
                port: port(env.sshport, DEFAULT_SSH_PORT),
                known_hosts: var(env.knownhosts).unwrap_or_else(|| DEFAULT_KNOWN_HOSTS.into()),
                allow_remote_hosts: false,
                allow_remote_command: false,
                config: var(env.sshconfig),
            },
            server: ServerConfig {
                base: var(env.base).unwrap_or_else(|| DEFAULT_BASE.into()),
                port: port(env.port, DEFAULT_PORT),
                host: DEFAULT_HOST.into(),
                title: var(env.title).unwrap_or_else(|| DEFAULT_TITLE.into()),
                allow_iframe: flag(env.allowiframe),
            },
            jwt: JwtConfig {
                enable: flag(env.jwt_enable),
                secret: var(env.jwt_secret).unwrap_or_else(|| DEFAULT_JWT_SECRET.into()),
                algorithms,
                expires_in: var(env.jwt_expires_in).unwrap_or_else(|| DEFAULT_JWT_EXPIRES_IN.into()),
            },
            command: var(env.command).unwrap_or_else(|| DEFAULT_COMMAND.into()),
            force_ssh: flag(env.forcessh),
            log_level: LogLevel::process_default(),
        }
    }

    /// The effective configuration when no file and no overrides are given.
    pub fn to_config(&self) -> Config {
        Config {
            ssh: self.ssh.clone(),
            server: self.server.clone(),
            jwt: self.jwt.clone(),
            ssl: None,
            command: self.command.clone(),
            force_ssh: self.force_ssh,
            log_level: self.log_level,
        }
    }
}
