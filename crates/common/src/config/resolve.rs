//! Three-tier configuration resolution: defaults, config file, CLI overrides.
//!
//! Each tier is read into a sparse [`Layer`] over a fixed schema, one typed
//! `Option` per field. Layers are applied in order onto a draft; a field that
//! is `None` in a layer never touches the draft, so an undefined override can
//! not erase a value resolved by a lower tier.

use std::path::Path;

use serde_json::{Map, Value};

use super::{coerce, Config, ConfigDefaults, JwtConfig, ServerConfig, SshConfig, SslConfig};
use crate::error::ConfigFileError;

/// Flat command-line overrides keyed by long option name (`ssh-user`,
/// `jwt-enable`, ...). A missing key means "defer to the lower tier".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOptions(Map<String, Value>);

impl CliOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolve the effective configuration.
///
/// With `filepath == None` the file tier is skipped. A path that is given but
/// cannot be read, including the empty path, is an error, never "no file".
///
/// # Errors
///
/// Returns [`ConfigFileError`] if the file cannot be read, is not valid
/// JSON5, or is not shaped like a config document.
pub fn resolve(
    defaults: &ConfigDefaults,
    filepath: Option<&Path>,
    cli: &CliOptions,
) -> Result<Config, ConfigFileError> {
    let mut draft = Draft::new(defaults);
    if let Some(path) = filepath {
        draft.apply(read_file(path)?);
    }
    draft.apply(Layer::from_cli(cli));
    Ok(draft.finish())
}

fn read_file(path: &Path) -> Result<Layer, ConfigFileError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
        path: path.to_owned(),
        source,
    })?;
    let doc: Value = json5::from_str(&raw).map_err(|source| ConfigFileError::Parse {
        path: path.to_owned(),
        source,
    })?;
    Layer::from_document(&doc).map_err(|reason| ConfigFileError::Shape {
        path: path.to_owned(),
        reason,
    })
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// Configuration under construction. TLS stays split into its two halves
/// until every tier has been applied.
struct Draft {
    config: Config,
    ssl: SslLayer,
}

impl Draft {
    fn new(defaults: &ConfigDefaults) -> Self {
        Self {
            config: defaults.to_config(),
            ssl: SslLayer::default(),
        }
    }

    fn apply(&mut self, layer: Layer) {
        layer.ssh.apply(&mut self.config.ssh);
        layer.server.apply(&mut self.config.server);
        layer.jwt.apply(&mut self.config.jwt);
        set_some(&mut self.ssl.key, layer.ssl.key);
        set_some(&mut self.ssl.cert, layer.ssl.cert);
        set(&mut self.config.command, layer.command);
        set(&mut self.config.force_ssh, layer.force_ssh);
        // An unrecognised level keeps whatever the lower tiers resolved.
        if let Some(level) = layer.log_level.and_then(|name| name.parse().ok()) {
            self.config.log_level = level;
        }
    }

    fn finish(mut self) -> Config {
        self.config.ssl = match (self.ssl.key, self.ssl.cert) {
            (Some(key), Some(cert)) => Some(SslConfig {
                key: key.into(),
                cert: cert.into(),
            }),
            _ => None,
        };
        self.config
    }
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

fn set_some<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

/// One tier's sparse view of the configuration.
#[derive(Debug, Default)]
struct Layer {
    ssh: SshLayer,
    server: ServerLayer,
    jwt: JwtLayer,
    ssl: SslLayer,
    command: Option<String>,
    force_ssh: Option<bool>,
    log_level: Option<String>,
}

impl Layer {
    fn from_document(doc: &Value) -> Result<Self, String> {
        let root = doc
            .as_object()
            .ok_or_else(|| "top level must be an object".to_owned())?;
        let top = Fields(Some(root));

        Ok(Self {
            ssh: SshLayer::read(section(root, "ssh")?, &SSH_FILE_KEYS),
            server: ServerLayer::read(section(root, "server")?, &SERVER_FILE_KEYS),
            jwt: JwtLayer::read(section(root, "jwt")?, &JWT_FILE_KEYS),
            ssl: SslLayer::read(section(root, "ssl")?, &SSL_FILE_KEYS),
            command: top.string("command"),
            force_ssh: top.flag("forceSSH"),
            log_level: top.string("logLevel"),
        })
    }

    fn from_cli(cli: &CliOptions) -> Self {
        let opts = Fields(Some(&cli.0));
        Self {
            ssh: SshLayer::read(opts, &SSH_CLI_KEYS),
            server: ServerLayer::read(opts, &SERVER_CLI_KEYS),
            jwt: JwtLayer::read(opts, &JWT_CLI_KEYS),
            ssl: SslLayer::read(opts, &SSL_CLI_KEYS),
            command: opts.string("command"),
            force_ssh: opts.flag("force-ssh"),
            log_level: opts.string("log-level"),
        }
    }
}

fn section<'a>(root: &'a Map<String, Value>, name: &str) -> Result<Fields<'a>, String> {
    match root.get(name) {
        None | Some(Value::Null) => Ok(Fields(None)),
        Some(Value::Object(map)) => Ok(Fields(Some(map))),
        Some(_) => Err(format!("section `{name}` must be an object")),
    }
}

/// Typed, null-aware field access over one JSON object.
#[derive(Clone, Copy)]
struct Fields<'a>(Option<&'a Map<String, Value>>);

impl<'a> Fields<'a> {
    fn value(self, key: &str) -> Option<&'a Value> {
        self.0?.get(key).filter(|v| !v.is_null())
    }

    fn string(self, key: &str) -> Option<String> {
        self.value(key).and_then(coerce::to_string)
    }

    fn port(self, key: &str) -> Option<u16> {
        self.value(key).and_then(coerce::to_port)
    }

    fn flag(self, key: &str) -> Option<bool> {
        self.value(key).map(|v| coerce::ensure_boolean(Some(v)))
    }

    fn algorithms(self, key: &str) -> Option<Vec<String>> {
        self.value(key).and_then(coerce::to_algorithms)
    }
}

// --- ssh -------------------------------------------------------------------

struct SshKeys {
    user: &'static str,
    host: &'static str,
    auth: &'static str,
    pass: &'static str,
    key: &'static str,
    port: &'static str,
    known_hosts: &'static str,
    allow_remote_hosts: &'static str,
    allow_remote_command: &'static str,
    config: &'static str,
}

const SSH_FILE_KEYS: SshKeys = SshKeys {
    user: "user",
    host: "host",
    auth: "auth",
    pass: "pass",
    key: "key",
    port: "port",
    known_hosts: "knownHosts",
    allow_remote_hosts: "allowRemoteHosts",
    allow_remote_command: "allowRemoteCommand",
    config: "config",
};

const SSH_CLI_KEYS: SshKeys = SshKeys {
    user: "ssh-user",
    host: "ssh-host",
    auth: "ssh-auth",
    pass: "ssh-pass",
    key: "ssh-key",
    port: "ssh-port",
    known_hosts: "known-hosts",
    allow_remote_hosts: "allow-remote-hosts",
    allow_remote_command: "allow-remote-command",
    config: "ssh-config",
};

#[derive(Debug, Default)]
struct SshLayer {
    user: Option<String>,
    host: Option<String>,
    auth: Option<String>,
    pass: Option<String>,
    key: Option<String>,
    port: Option<u16>,
    known_hosts: Option<String>,
    allow_remote_hosts: Option<bool>,
    allow_remote_command: Option<bool>,
    config: Option<String>,
}

impl SshLayer {
    fn read(f: Fields<'_>, k: &SshKeys) -> Self {
        Self {
            user: f.string(k.user),
            host: f.string(k.host),
            auth: f.string(k.auth),
            pass: f.string(k.pass),
            key: f.string(k.key),
            port: f.port(k.port),
            known_hosts: f.string(k.known_hosts),
            allow_remote_hosts: f.flag(k.allow_remote_hosts),
            allow_remote_command: f.flag(k.allow_remote_command),
            config: f.string(k.config),
        }
    }

    fn apply(self, t: &mut SshConfig) {
        set(&mut t.user, self.user);
        set(&mut t.host, self.host);
        set(&mut t.auth, self.auth);
        set_some(&mut t.pass, self.pass);
        set_some(&mut t.key, self.key);
        set(&mut t.port, self.port);
        set(&mut t.known_hosts, self.known_hosts);
        set(&mut t.allow_remote_hosts, self.allow_remote_hosts);
        set(&mut t.allow_remote_command, self.allow_remote_command);
        set_some(&mut t.config, self.config);
    }
}

// --- server ----------------------------------------------------------------

struct ServerKeys {
    base: &'static str,
    port: &'static str,
    host: &'static str,
    title: &'static str,
    allow_iframe: &'static str,
}

const SERVER_FILE_KEYS: ServerKeys = ServerKeys {
    base: "base",
    port: "port",
    host: "host",
    title: "title",
    allow_iframe: "allowIframe",
};

const SERVER_CLI_KEYS: ServerKeys = ServerKeys {
    base: "base",
    port: "port",
    host: "host",
    title: "title",
    allow_iframe: "allow-iframe",
};

#[derive(Debug, Default)]
struct ServerLayer {
    base: Option<String>,
    port: Option<u16>,
    host: Option<String>,
    title: Option<String>,
    allow_iframe: Option<bool>,
}

impl ServerLayer {
    fn read(f: Fields<'_>, k: &ServerKeys) -> Self {
        Self {
            base: f.string(k.base),
            port: f.port(k.port),
            host: f.string(k.host),
            title: f.string(k.title),
            allow_iframe: f.flag(k.allow_iframe),
        }
    }

    fn apply(self, t: &mut ServerConfig) {
        set(&mut t.base, self.base);
        set(&mut t.port, self.port);
        set(&mut t.host, self.host);
        set(&mut t.title, self.title);
        set(&mut t.allow_iframe, self.allow_iframe);
    }
}

// --- jwt -------------------------------------------------------------------

struct JwtKeys {
    enable: &'static str,
    secret: &'static str,
    algorithms: &'static str,
    expires_in: &'static str,
}

const JWT_FILE_KEYS: JwtKeys = JwtKeys {
    enable: "enable",
    secret: "secret",
    algorithms: "algorithms",
    expires_in: "expiresIn",
};

const JWT_CLI_KEYS: JwtKeys = JwtKeys {
    enable: "jwt-enable",
    secret: "jwt-secret",
    algorithms: "jwt-algorithms",
    expires_in: "jwt-expires-in",
};

#[derive(Debug, Default)]
struct JwtLayer {
    enable: Option<bool>,
    secret: Option<String>,
    algorithms: Option<Vec<String>>,
    expires_in: Option<String>,
}

impl JwtLayer {
    fn read(f: Fields<'_>, k: &JwtKeys) -> Self {
        Self {
            enable: f.flag(k.enable),
            secret: f.string(k.secret),
            algorithms: f.algorithms(k.algorithms),
            expires_in: f.string(k.expires_in),
        }
    }

    fn apply(self, t: &mut JwtConfig) {
        set(&mut t.enable, self.enable);
        set(&mut t.secret, self.secret);
        set(&mut t.algorithms, self.algorithms);
        set(&mut t.expires_in, self.expires_in);
    }
}

// --- ssl -------------------------------------------------------------------

struct SslKeys {
    key: &'static str,
    cert: &'static str,
}

const SSL_FILE_KEYS: SslKeys = SslKeys {
    key: "key",
    cert: "cert",
};

const SSL_CLI_KEYS: SslKeys = SslKeys {
    key: "ssl-key",
    cert: "ssl-cert",
};

#[derive(Debug, Default)]
struct SslLayer {
    key: Option<String>,
    cert: Option<String>,
}

impl SslLayer {
    fn read(f: Fields<'_>, k: &SslKeys) -> Self {
        Self {
            key: f.string(k.key),
            cert: f.string(k.cert),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use serde_json::json;
    use tempfile::NamedTempFile;

    use super::*;
    use crate::config::LogLevel;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn defaults() -> ConfigDefaults {
        ConfigDefaults::builtin()
    }

    fn resolve_with(file: Option<&str>, cli: &CliOptions) -> Config {
        match file {
            Some(contents) => {
                let f = write_config(contents);
                resolve(&defaults(), Some(f.path()), cli).unwrap()
            }
            None => resolve(&defaults(), None, cli).unwrap(),
        }
    }

    #[test]
    fn no_file_no_overrides_yields_defaults() {
        let cfg = resolve_with(None, &CliOptions::new());
        assert_eq!(cfg, defaults().to_config());
    }

    #[test]
    fn file_with_only_server_port_keeps_everything_else() {
        let cfg = resolve_with(Some(r#"{ "server": { "port": 8443 } }"#), &CliOptions::new());

        let mut expected = defaults().to_config();
        expected.server.port = 8443;
        assert_eq!(cfg, expected);
    }

    #[test]
    fn file_accepts_relaxed_json() {
        let cfg = resolve_with(
            Some(
                r#"
                // comments and unquoted keys are fine
                {
                  ssh: { user: 'admin', port: 2222, allowRemoteHosts: 'yes', },
                  server: { title: 'Ops console', allowIframe: true },
                  command: 'bash',
                  forceSSH: 1,
                  logLevel: 'warn',
                }
                "#,
            ),
            &CliOptions::new(),
        );
        assert_eq!(cfg.ssh.user, "admin");
        assert_eq!(cfg.ssh.port, 2222);
        assert!(cfg.ssh.allow_remote_hosts);
        assert_eq!(cfg.ssh.host, "localhost");
        assert_eq!(cfg.server.title, "Ops console");
        assert!(cfg.server.allow_iframe);
        assert_eq!(cfg.command, "bash");
        assert!(cfg.force_ssh);
        assert_eq!(cfg.log_level, LogLevel::Warn);
    }

    #[test]
    fn cli_beats_file_beats_defaults() {
        let cli = CliOptions::new()
            .with("ssh-user", "cli-user")
            .with("port", 9000);
        let cfg = resolve_with(
            Some(r#"{ ssh: { user: "file-user", host: "file-host" }, server: { port: 8000 } }"#),
            &cli,
        );
        assert_eq!(cfg.ssh.user, "cli-user");
        assert_eq!(cfg.ssh.host, "file-host");
        assert_eq!(cfg.ssh.auth, "password");
        assert_eq!(cfg.server.port, 9000);
    }

    #[test]
    fn undefined_cli_values_never_erase_resolved_values() {
        let cli = CliOptions::new()
            .with("ssh-host", Value::Null)
            .with("title", Value::Null)
            .with("jwt-algorithms", Value::Null);
        let cfg = resolve_with(
            Some(r#"{ ssh: { host: "db01" }, server: { title: "T" }, jwt: { algorithms: ["HS512"] } }"#),
            &cli,
        );
        assert_eq!(cfg.ssh.host, "db01");
        assert_eq!(cfg.server.title, "T");
        assert_eq!(cfg.jwt.algorithms, vec!["HS512".to_owned()]);
    }

    #[test]
    fn absent_cli_algorithms_keep_file_algorithms() {
        let cfg = resolve_with(Some(r#"{ jwt: { algorithms: "RS256,ES256" } }"#), &CliOptions::new());
        assert_eq!(cfg.jwt.algorithms, vec!["RS256".to_owned(), "ES256".to_owned()]);
    }

    #[test]
    fn cli_algorithms_are_split_on_commas() {
        let cli = CliOptions::new().with("jwt-algorithms", "HS256,HS384");
        let cfg = resolve_with(None, &cli);
        assert_eq!(cfg.jwt.algorithms, vec!["HS256".to_owned(), "HS384".to_owned()]);
    }

    #[test]
    fn jwt_section_merges_per_field() {
        let cli = CliOptions::new().with("jwt-enable", "on");
        let cfg = resolve_with(Some(r#"{ jwt: { secret: "file-secret" } }"#), &cli);
        assert!(cfg.jwt.enable);
        assert_eq!(cfg.jwt.secret, "file-secret");
        assert_eq!(cfg.jwt.algorithms, vec!["HS256".to_owned()]);
        assert_eq!(cfg.jwt.expires_in, "1h");
    }

    #[test]
    fn cli_booleans_use_permissive_parser() {
        let cli = CliOptions::new()
            .with("allow-iframe", "yes")
            .with("force-ssh", "0")
            .with("allow-remote-command", 1);
        let cfg = resolve_with(None, &cli);
        assert!(cfg.server.allow_iframe);
        assert!(!cfg.force_ssh);
        assert!(cfg.ssh.allow_remote_command);
    }

    #[test]
    fn cli_boolean_false_overrides_file_true() {
        let cli = CliOptions::new().with("force-ssh", "nope");
        let cfg = resolve_with(Some(r#"{ forceSSH: true }"#), &cli);
        assert!(!cfg.force_ssh);
    }

    #[test]
    fn invalid_cli_log_level_keeps_file_level() {
        let cli = CliOptions::new().with("log-level", "loud");
        let cfg = resolve_with(Some(r#"{ logLevel: "error" }"#), &cli);
        assert_eq!(cfg.log_level, LogLevel::Error);
    }

    #[test]
    fn invalid_file_log_level_falls_back_to_process_default() {
        let cfg = resolve_with(Some(r#"{ logLevel: "chatty" }"#), &CliOptions::new());
        assert_eq!(cfg.log_level, LogLevel::process_default());
    }

    #[test]
    fn valid_cli_log_level_wins() {
        let cli = CliOptions::new().with("log-level", "silly");
        let cfg = resolve_with(Some(r#"{ logLevel: "error" }"#), &cli);
        assert_eq!(cfg.log_level, LogLevel::Silly);
    }

    #[test]
    fn ssl_requires_both_key_and_cert() {
        let cases = [
            (None, None, false),
            (Some("key.pem"), None, false),
            (None, Some("cert.pem"), false),
            (Some("key.pem"), Some("cert.pem"), true),
        ];
        for (key, cert, present) in cases {
            let mut cli = CliOptions::new();
            if let Some(k) = key {
                cli.insert("ssl-key", k);
            }
            if let Some(c) = cert {
                cli.insert("ssl-cert", c);
            }
            let cfg = resolve_with(None, &cli);
            assert_eq!(cfg.ssl.is_some(), present, "key={key:?} cert={cert:?}");
        }
    }

    #[test]
    fn ssl_halves_combine_across_tiers() {
        let cli = CliOptions::new().with("ssl-cert", "/tls/cli-cert.pem");
        let cfg = resolve_with(Some(r#"{ ssl: { key: "/tls/file-key.pem" } }"#), &cli);
        assert_eq!(
            cfg.ssl,
            Some(SslConfig {
                key: PathBuf::from("/tls/file-key.pem"),
                cert: PathBuf::from("/tls/cli-cert.pem"),
            })
        );
    }

    #[test]
    fn partial_ssl_in_file_resolves_absent() {
        let cfg = resolve_with(Some(r#"{ ssl: { cert: "/tls/cert.pem" } }"#), &CliOptions::new());
        assert_eq!(cfg.ssl, None);
    }

    #[test]
    fn numeric_strings_coerce_to_ports() {
        let cli = CliOptions::new().with("ssh-port", "2200");
        let cfg = resolve_with(Some(r#"{ server: { port: "4000" } }"#), &cli);
        assert_eq!(cfg.ssh.port, 2200);
        assert_eq!(cfg.server.port, 4000);
    }

    #[test]
    fn unparsable_port_falls_through() {
        let cli = CliOptions::new().with("port", "http");
        let cfg = resolve_with(Some(r#"{ server: { port: 8443 } }"#), &cli);
        assert_eq!(cfg.server.port, 8443);
    }

    #[test]
    fn command_is_stringified() {
        let cli = CliOptions::new().with("command", json!(42));
        let cfg = resolve_with(None, &cli);
        assert_eq!(cfg.command, "42");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = resolve(
            &defaults(),
            Some(Path::new("/definitely/not/here.json5")),
            &CliOptions::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigFileError::Read { .. }));
    }

    #[test]
    fn empty_path_is_not_treated_as_absent() {
        let err = resolve(&defaults(), Some(Path::new("")), &CliOptions::new()).unwrap_err();
        assert!(matches!(err, ConfigFileError::Read { .. }));
    }

    #[test]
    fn malformed_file_is_fatal() {
        let f = write_config("{ server: { port: 8443 ");
        let err = resolve(&defaults(), Some(f.path()), &CliOptions::new()).unwrap_err();
        assert!(matches!(err, ConfigFileError::Parse { .. }));
    }

    #[test]
    fn non_object_document_is_rejected() {
        let f = write_config("[1, 2, 3]");
        let err = resolve(&defaults(), Some(f.path()), &CliOptions::new()).unwrap_err();
        assert!(matches!(err, ConfigFileError::Shape { .. }));
    }

    #[test]
    fn non_object_section_is_rejected() {
        let f = write_config(r#"{ ssh: "root@host" }"#);
        let err = resolve(&defaults(), Some(f.path()), &CliOptions::new()).unwrap_err();
        assert!(matches!(err, ConfigFileError::Shape { ref reason, .. } if reason.contains("ssh")));
    }

    #[test]
    fn null_sections_are_ignored() {
        let cfg = resolve_with(Some(r#"{ ssh: null, jwt: null, command: null }"#), &CliOptions::new());
        assert_eq!(cfg, defaults().to_config());
    }

    #[test]
    fn optional_ssh_fields_stay_absent_until_set() {
        let cfg = resolve_with(None, &CliOptions::new());
        assert_eq!(cfg.ssh.pass, None);
        assert_eq!(cfg.ssh.key, None);
        assert_eq!(cfg.ssh.config, None);

        let cli = CliOptions::new()
            .with("ssh-pass", "hunter2")
            .with("ssh-key", "~/.ssh/id_ed25519")
            .with("ssh-config", "~/.ssh/config");
        let cfg = resolve_with(None, &cli);
        assert_eq!(cfg.ssh.pass.as_deref(), Some("hunter2"));
        assert_eq!(cfg.ssh.key.as_deref(), Some("~/.ssh/id_ed25519"));
        assert_eq!(cfg.ssh.config.as_deref(), Some("~/.ssh/config"));
    }
}
