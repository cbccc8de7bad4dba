//! HTTP / HTTPS accept loop.
//!
//! Plain HTTP goes through `axum::serve`. With TLS material present each
//! accepted TCP stream is wrapped by `tokio-rustls` and driven by a
//! `hyper-util` auto (HTTP/1 + HTTP/2) connection with upgrade support, so
//! WebSocket upgrades work the same on both paths.
//!
//! On shutdown both paths stop accepting and drain: open connections finish
//! their in-flight requests and are then closed.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::Router;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use rustls::ServerConfig;
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use tokio_rustls::TlsAcceptor;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info};

/// Live handle on a running listener.
pub struct ListenerHandle {
    local_addr: SocketAddr,
    tls: bool,
    shutdown: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl ListenerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Stop accepting new connections.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Wait for the accept loop to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the server failed or its task panicked.
    pub async fn wait(self) -> Result<()> {
        self.task.await.context("listener task panicked")?
    }
}

/// Bind `host:port` and start serving `app`.
///
/// The socket is bound before this returns, so bind errors surface here.
///
/// # Errors
///
/// Returns an error if the address cannot be resolved or bound.
pub async fn listen(
    app: Router,
    host: &str,
    port: u16,
    base: &str,
    tls: Option<Arc<ServerConfig>>,
) -> Result<ListenerHandle> {
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    let local_addr = listener.local_addr()?;
    let shutdown = CancellationToken::new();
    let is_tls = tls.is_some();

    info!(
        addr = %local_addr,
        tls = is_tls,
        base = if base.is_empty() { "/" } else { base },
        "listening"
    );

    let task = match tls {
        Some(config) => tokio::spawn(serve_tls(
            listener,
            app,
            TlsAcceptor::from(config),
            shutdown.clone(),
        )),
        None => {
            let signal = shutdown.clone().cancelled_owned();
            tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(signal)
                    .await
                    .context("HTTP server failed")
            })
        }
    };

    Ok(ListenerHandle {
        local_addr,
        tls: is_tls,
        shutdown,
        task,
    })
}

/// Upper bound on the TLS handshake of one connection.
const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

async fn serve_tls(
    listener: TcpListener,
    app: Router,
    acceptor: TlsAcceptor,
    shutdown: CancellationToken,
) -> Result<()> {
    let connections = TaskTracker::new();

    loop {
        let (tcp, peer_addr) = tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    error!(error = %e, "accept error");
                    continue;
                }
            },
        };

        connections.spawn(serve_tls_connection(
            tcp,
            peer_addr,
            acceptor.clone(),
            app.clone(),
            shutdown.clone(),
        ));
    }

    // Stop accepting, then drain: pending handshakes are dropped and live
    // connections finish their in-flight requests.
    drop(listener);
    connections.close();
    connections.wait().await;
    info!("TLS listener stopped");
    Ok(())
}

async fn serve_tls_connection(
    tcp: TcpStream,
    peer_addr: SocketAddr,
    acceptor: TlsAcceptor,
    app: Router,
    shutdown: CancellationToken,
) {
    let handshake = tokio::time::timeout(TLS_HANDSHAKE_TIMEOUT, acceptor.accept(tcp));
    let stream = tokio::select! {
        () = shutdown.cancelled() => return,
        result = handshake => match result {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!(%peer_addr, error = %e, "TLS handshake failed");
                return;
            }
            Err(_) => {
                debug!(%peer_addr, "TLS handshake timed out");
                return;
            }
        },
    };

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection_with_upgrades(
        TokioIo::new(stream),
        TowerToHyperService::new(app),
    );
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        () = shutdown.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = result {
        debug!(%peer_addr, error = %e, "connection error");
    }
}
