//! Common error types shared across crates.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to load a configuration file.
///
/// Every variant is fatal: startup aborts rather than continuing with a
/// partially-applied or silently-empty configuration.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file could not be read (missing, unreadable, or an empty path).
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file contents are not a valid JSON5 document.
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: json5::Error,
    },

    /// The document parsed but does not have the expected shape.
    #[error("invalid config file {path:?}: {reason}")]
    Shape { path: PathBuf, reason: String },
}
