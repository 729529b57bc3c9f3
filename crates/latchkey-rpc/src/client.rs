//! Mutual-TLS RPC client.

use std::fmt;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use latchkey_pki::{Certificate, CertifiedKey};

use crate::error::{Result, RpcError};
use crate::frame::{read_frame, write_frame, Frame, MAX_PAYLOAD_LEN};
use crate::messages::{Message, PingRequest, PingResponse, WhoAmIRequest, WhoAmIResponse};
use crate::tls;

/// An authenticated connection to a server.
///
/// Requests are answered in order; a client issues one request at a time.
pub struct Client {
    stream: TlsStream<TcpStream>,
    max_payload_len: usize,
}

impl Client {
    /// Connect, presenting `identity` and trusting only `anchor`.
    ///
    /// `server_name` must be a name the server certificate is valid for.
    pub async fn dial(
        addr: impl ToSocketAddrs,
        server_name: &str,
        identity: &CertifiedKey,
        anchor: &Certificate,
    ) -> Result<Self> {
        let config = tls::client_config(identity, anchor)?;
        let name = tls::server_name(server_name)?;

        let tcp = TcpStream::connect(addr)
            .await
            .map_err(|e| RpcError::Connection(format!("connect failed: {e}")))?;
        let peer = tcp.peer_addr().ok();
        let stream = TlsConnector::from(config)
            .connect(name, tcp)
            .await
            .map_err(|e| RpcError::Connection(format!("TLS handshake failed: {e}")))?;

        tracing::debug!(?peer, server_name, "rpc client connected");
        Ok(Self {
            stream,
            max_payload_len: MAX_PAYLOAD_LEN,
        })
    }

    /// Bound on response payloads accepted from the server.
    pub fn with_max_payload_len(mut self, max: usize) -> Self {
        self.max_payload_len = max;
        self
    }

    /// Round-trip a ping; returns the echoed id.
    pub async fn ping(&mut self, id: i32) -> Result<i32> {
        let response: PingResponse = self.call(&PingRequest { id }).await?;
        Ok(response.id)
    }

    /// The identity the server resolved for this connection.
    pub async fn who_am_i(&mut self) -> Result<WhoAmIResponse> {
        self.call(&WhoAmIRequest {}).await
    }

    /// Send a typed request and decode the typed response.
    pub async fn call<Req: Message + Sync, Res: Message>(&mut self, request: &Req) -> Result<Res> {
        self.send_frame(&request.to_frame()?).await?;
        let response = self.recv_frame().await?;
        Res::from_frame(&response)
    }

    pub async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        write_frame(&mut self.stream, frame, self.max_payload_len).await
    }

    /// Read the next frame. A peer that closed the connection is an error.
    pub async fn recv_frame(&mut self) -> Result<Frame> {
        read_frame(&mut self.stream, self.max_payload_len)
            .await?
            .ok_or_else(|| RpcError::Connection("connection closed by peer".into()))
    }

    /// Raw access to the TLS stream, for speaking outside the framing.
    pub fn stream_mut(&mut self) -> &mut TlsStream<TcpStream> {
        &mut self.stream
    }

    /// Send close_notify and shut the socket down.
    pub async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("peer", &self.stream.get_ref().0.peer_addr().ok())
            .field("max_payload_len", &self.max_payload_len)
            .finish()
    }
}
