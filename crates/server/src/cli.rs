//! Command-line front end.
//!
//! Every option is kept as raw text and handed to the config resolver as a
//! flat override map; typing and validation happen there, so a bad value
//! falls through to the lower tier instead of aborting argument parsing.

use std::path::PathBuf;

use clap::Parser;
use common::CliOptions;
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(name = "webtty")]
#[command(about = "Terminal in the browser over HTTP and WebSockets", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (relaxed JSON). Without it only defaults and flags apply.
    #[arg(long, value_name = "FILE")]
    pub conf: Option<PathBuf>,

    // ssh
    /// SSH user
    #[arg(long)]
    pub ssh_user: Option<String>,
    /// SSH host
    #[arg(long)]
    pub ssh_host: Option<String>,
    /// SSH authentication mode (password, publickey)
    #[arg(long)]
    pub ssh_auth: Option<String>,
    #[arg(long)]
    pub ssh_port: Option<String>,
    #[arg(long)]
    pub ssh_pass: Option<String>,
    /// Path to an SSH private key
    #[arg(long)]
    pub ssh_key: Option<String>,
    /// Path to an ssh_config file
    #[arg(long)]
    pub ssh_config: Option<String>,
    #[arg(long)]
    pub known_hosts: Option<String>,
    /// Let the browser pick the SSH host
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub allow_remote_hosts: Option<String>,
    /// Let the browser pick the remote command
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub allow_remote_command: Option<String>,

    // server
    /// URL prefix all routes are mounted under
    #[arg(long)]
    pub base: Option<String>,
    /// Bind address
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<String>,
    /// Page title
    #[arg(long)]
    pub title: Option<String>,
    /// Allow embedding in a cross-origin iframe
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub allow_iframe: Option<String>,

    // jwt
    /// Require a signed token on the page routes
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub jwt_enable: Option<String>,
    #[arg(long)]
    pub jwt_secret: Option<String>,
    /// Comma-separated list of accepted signing algorithms
    #[arg(long)]
    pub jwt_algorithms: Option<String>,
    #[arg(long)]
    pub jwt_expires_in: Option<String>,

    // ssl
    /// PEM private key; TLS is enabled only with --ssl-cert as well
    #[arg(long)]
    pub ssl_key: Option<String>,
    /// PEM certificate chain
    #[arg(long)]
    pub ssl_cert: Option<String>,

    /// Command run for local sessions
    #[arg(long)]
    pub command: Option<String>,
    /// Always connect over SSH, even to localhost
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub force_ssh: Option<String>,
    /// error, warn, info, http, verbose, debug or silly
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Flatten the given options into the resolver's override map, keyed by
    /// long flag name. Omitted flags are left out entirely.
    pub fn overrides(&self) -> CliOptions {
        let pairs: [(&str, &Option<String>); 24] = [
            ("ssh-user", &self.ssh_user),
            ("ssh-host", &self.ssh_host),
            ("ssh-auth", &self.ssh_auth),
            ("ssh-port", &self.ssh_port),
            ("ssh-pass", &self.ssh_pass),
            ("ssh-key", &self.ssh_key),
            ("ssh-config", &self.ssh_config),
            ("known-hosts", &self.known_hosts),
            ("allow-remote-hosts", &self.allow_remote_hosts),
            ("allow-remote-command", &self.allow_remote_command),
            ("base", &self.base),
            ("host", &self.host),
            ("port", &self.port),
            ("title", &self.title),
            ("allow-iframe", &self.allow_iframe),
            ("jwt-enable", &self.jwt_enable),
            ("jwt-secret", &self.jwt_secret),
            ("jwt-algorithms", &self.jwt_algorithms),
            ("jwt-expires-in", &self.jwt_expires_in),
            ("ssl-key", &self.ssl_key),
            ("ssl-cert", &self.ssl_cert),
            ("command", &self.command),
            ("force-ssh", &self.force_ssh),
            ("log-level", &self.log_level),
        ];

        let mut opts = CliOptions::new();
        for (key, value) in pairs {
            if let Some(value) = value {
                opts.insert(key, Value::String(value.clone()));
            }
        }
        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_flags_means_no_overrides() {
        let cli = Cli::try_parse_from(["webtty"]).unwrap();
        assert!(cli.conf.is_none());
        assert!(cli.overrides().is_empty());
    }

    #[test]
    fn flags_map_to_kebab_case_keys() {
        let cli = Cli::try_parse_from([
            "webtty",
            "--conf",
            "/etc/webtty.json5",
            "--ssh-user",
            "root",
            "--port",
            "8080",
            "--jwt-algorithms",
            "HS256,RS256",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.conf.as_deref(), Some(std::path::Path::new("/etc/webtty.json5")));

        let opts = cli.overrides();
        assert_eq!(opts.get("ssh-user"), Some(&Value::from("root")));
        assert_eq!(opts.get("port"), Some(&Value::from("8080")));
        assert_eq!(opts.get("jwt-algorithms"), Some(&Value::from("HS256,RS256")));
        assert_eq!(opts.get("log-level"), Some(&Value::from("debug")));
        assert!(opts.get("ssh-host").is_none());
    }

    #[test]
    fn bare_boolean_flag_means_true() {
        let cli = Cli::try_parse_from(["webtty", "--jwt-enable", "--allow-iframe=false"]).unwrap();
        let opts = cli.overrides();
        assert_eq!(opts.get("jwt-enable"), Some(&Value::from("true")));
        assert_eq!(opts.get("allow-iframe"), Some(&Value::from("false")));
    }

    #[test]
    fn overrides_resolve_over_defaults() {
        let cli = Cli::try_parse_from(["webtty", "--ssl-key", "k.pem", "--force-ssh"]).unwrap();
        let cfg = common::resolve(&common::ConfigDefaults::builtin(), None, &cli.overrides()).unwrap();
        assert!(cfg.force_ssh);
        assert!(cfg.ssl.is_none(), "a key without a certificate is not TLS");
    }
}
