//! TLS material loading and rustls server configuration.
//!
//! Key and certificate are read from the paths in the resolved `ssl` section
//! into memory once, before the listener is bound. Any failure here aborts
//! startup; there is no fallback to plain HTTP.

use std::{io::BufReader, path::Path, sync::Arc};

use bytes::Bytes;
use common::config::SslConfig;
use rustls::ServerConfig;
use thiserror::Error;

/// Errors while loading TLS material.
#[derive(Debug, Error)]
pub enum TlsLoadError {
    #[error("failed to read TLS {what} from {path:?}: {source}")]
    Read {
        what: &'static str,
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TLS certificate chain: {0}")]
    Certificate(#[source] std::io::Error),

    #[error("no certificate found in PEM data")]
    NoCertificate,

    #[error("failed to read TLS private key: {0}")]
    PrivateKey(#[source] std::io::Error),

    #[error("no private key found in PEM data")]
    NoPrivateKey,

    #[error("failed to build rustls ServerConfig: {0}")]
    Rustls(#[from] rustls::Error),
}

/// PEM-encoded key and certificate held in memory.
#[derive(Debug, Clone)]
pub struct SslBuffer {
    pub key: Bytes,
    pub cert: Bytes,
}

/// Read the key and certificate files named by `ssl`.
///
/// `None` passes through as `None` ("serve plain HTTP").
///
/// # Errors
///
/// Returns [`TlsLoadError::Read`] if either file cannot be read.
pub async fn load(ssl: Option<&SslConfig>) -> Result<Option<SslBuffer>, TlsLoadError> {
    let Some(ssl) = ssl else {
        return Ok(None);
    };
    let key = read("private key", &ssl.key).await?;
    let cert = read("certificate", &ssl.cert).await?;
    Ok(Some(SslBuffer { key, cert }))
}

async fn read(what: &'static str, path: &Path) -> Result<Bytes, TlsLoadError> {
    tokio::fs::read(path)
        .await
        .map(Bytes::from)
        .map_err(|source| TlsLoadError::Read {
            what,
            path: path.to_owned(),
            source,
        })
}

/// Build a [`rustls::ServerConfig`] from PEM-encoded certificate and private key bytes.
///
/// # Errors
///
/// Returns an error if the certificate or key cannot be parsed, or if rustls
/// rejects the configuration.
pub fn build_server_config(buffer: &SslBuffer) -> Result<Arc<ServerConfig>, TlsLoadError> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(&buffer.cert[..]))
        .collect::<Result<Vec<_>, _>>()
        .map_err(TlsLoadError::Certificate)?;
    if certs.is_empty() {
        return Err(TlsLoadError::NoCertificate);
    }

    let key = rustls_pemfile::private_key(&mut BufReader::new(&buffer.key[..]))
        .map_err(TlsLoadError::PrivateKey)?
        .ok_or(TlsLoadError::NoPrivateKey)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}
