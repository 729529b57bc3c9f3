//! Mutual-TLS RPC server.
//!
//! One task runs the accept loop; every accepted socket gets its own task
//! that handshakes, authenticates the peer against the registry, then
//! serves frames until the peer disconnects. A failing connection task is
//! logged and never reaches the accept loop.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

use latchkey_registry::Registry;

use crate::auth;
use crate::connection::{Connection, ConnectionState};
use crate::dispatch::{Dispatcher, Session};
use crate::error::{Result, RpcError};
use crate::frame::{read_frame, write_frame, MAX_ENCODABLE_LEN, MAX_PAYLOAD_LEN};

/// Default bound on the TLS handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after a failed `accept` before trying again.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Server runtime settings.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Bound on the TLS handshake of each connection.
    pub handshake_timeout: Duration,
    /// Close connections that send nothing for this long. `None` disables.
    pub idle_timeout: Option<Duration>,
    /// Largest accepted frame payload.
    pub max_payload_len: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            idle_timeout: None,
            max_payload_len: MAX_PAYLOAD_LEN,
        }
    }
}

impl RpcConfig {
    /// Check that every setting can be honored.
    pub fn validate(&self) -> Result<()> {
        if self.max_payload_len > MAX_ENCODABLE_LEN {
            return Err(RpcError::InvalidConfig(format!(
                "max_payload_len {} exceeds the frame length field (max {})",
                self.max_payload_len, MAX_ENCODABLE_LEN
            )));
        }
        if self.handshake_timeout.is_zero() {
            return Err(RpcError::InvalidConfig(
                "handshake_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

struct Shared<R: ?Sized> {
    acceptor: TlsAcceptor,
    registry: Arc<R>,
    dispatcher: Arc<Dispatcher>,
    config: RpcConfig,
}

/// A bound, not yet running, server.
pub struct Server<R: ?Sized> {
    listener: TcpListener,
    shared: Arc<Shared<R>>,
}

impl<R: Registry + ?Sized + 'static> Server<R> {
    /// Bind the listening socket.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        tls: Arc<rustls::ServerConfig>,
        registry: Arc<R>,
        dispatcher: Dispatcher,
        config: RpcConfig,
    ) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RpcError::Connection(format!("bind failed: {e}")))?;
        tracing::info!(addr = %listener.local_addr()?, ?dispatcher, "rpc listener bound");

        Ok(Self {
            listener,
            shared: Arc::new(Shared {
                acceptor: TlsAcceptor::from(tls),
                registry,
                dispatcher: Arc::new(dispatcher),
                config,
            }),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the accept loop on a background task.
    pub fn spawn(self) -> Result<ServerHandle> {
        let local_addr = self.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<Option<Duration>>();
        let task = tokio::spawn(self.run_until(async move {
            // A dropped handle stops the server without draining.
            shutdown_rx.await.unwrap_or(None)
        }));
        Ok(ServerHandle {
            local_addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// `shutdown` yields how long to wait for open connections before
    /// releasing the listener. Open connections are never aborted.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = Option<Duration>>,
    {
        let (drain_tx, mut drain_rx) = mpsc::channel::<()>(1);
        tokio::pin!(shutdown);

        let drain = loop {
            tokio::select! {
                drain = &mut shutdown => break drain,
                accepted = self.listener.accept() => match accepted {
                    Ok((tcp, peer_addr)) => {
                        let shared = Arc::clone(&self.shared);
                        let guard = drain_tx.clone();
                        tokio::spawn(async move {
                            let _guard = guard;
                            let mut conn = Connection::new(peer_addr);
                            match handle_connection(&shared, tcp, &mut conn).await {
                                Ok(()) => tracing::debug!(peer = %peer_addr, "connection closed"),
                                Err(e) => tracing::warn!(
                                    peer = %peer_addr,
                                    state = %conn.state(),
                                    error = %e,
                                    "connection dropped"
                                ),
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "TCP accept failed");
                        // Errors like EMFILE persist until a connection closes.
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        };

        tracing::info!("shutdown requested, no longer accepting connections");
        drop(drain_tx);

        if let Some(limit) = drain {
            match tokio::time::timeout(limit, drain_rx.recv()).await {
                Ok(_) => tracing::info!("open connections drained"),
                Err(_) => tracing::warn!(
                    timeout = ?limit,
                    "drain timeout elapsed, leaving open connections running"
                ),
            }
        }

        drop(self.listener);
        tracing::info!("rpc listener released");
    }
}

async fn handle_connection<R: Registry + ?Sized>(
    shared: &Shared<R>,
    tcp: TcpStream,
    conn: &mut Connection,
) -> Result<()> {
    conn.advance(ConnectionState::Handshaking)?;
    let handshake = tokio::time::timeout(
        shared.config.handshake_timeout,
        shared.acceptor.accept(tcp),
    )
    .await;
    let mut stream = match handshake {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            conn.reject()?;
            return Err(RpcError::Connection(format!("TLS handshake failed: {e}")));
        }
        Err(_) => {
            conn.reject()?;
            return Err(RpcError::Timeout("TLS handshake"));
        }
    };
    conn.advance(ConnectionState::Authenticated)?;

    let peer_certificates = stream
        .get_ref()
        .1
        .peer_certificates()
        .map(|certs| certs.to_vec())
        .unwrap_or_default();
    let identity = match auth::authenticate(&peer_certificates, shared.registry.as_ref()).await {
        Ok(identity) => identity,
        Err(e) => {
            conn.reject()?;
            let _ = stream.shutdown().await;
            return Err(e);
        }
    };

    tracing::info!(
        peer = %conn.peer_addr(),
        email = %identity.email,
        role = %identity.role,
        "connection authenticated"
    );
    conn.advance(ConnectionState::Serving)?;

    let session = Session {
        identity,
        peer_addr: conn.peer_addr(),
    };
    let outcome = serve_frames(shared, &mut stream, &session).await;
    let _ = stream.shutdown().await;
    conn.advance(ConnectionState::Closed)?;
    outcome
}

async fn serve_frames<R, S>(shared: &Shared<R>, stream: &mut S, session: &Session) -> Result<()>
where
    R: ?Sized,
    S: AsyncRead + AsyncWrite + Unpin,
{
    let max = shared.config.max_payload_len;
    loop {
        let next = read_frame(stream, max);
        let frame = match shared.config.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, next)
                .await
                .map_err(|_| RpcError::Timeout("idle connection"))??,
            None => next.await?,
        };
        let Some(frame) = frame else {
            tracing::debug!(peer = %session.peer_addr, "peer closed connection");
            return Ok(());
        };

        let msg_type = frame.msg_type;
        let response = shared.dispatcher.dispatch(session, frame).await?;
        write_frame(stream, &response, max).await?;
        tracing::trace!(peer = %session.peer_addr, msg_type, "request served");
    }
}

/// Handle to a running server.
///
/// Dropping the handle stops the accept loop without draining.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<Option<Duration>>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, wait up to `drain` for open connections, then release
    /// the listening socket.
    pub async fn shutdown(mut self, drain: Option<Duration>) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(drain);
        }
        self.task
            .await
            .map_err(|e| RpcError::Connection(format!("server task failed: {e}")))
    }
}
