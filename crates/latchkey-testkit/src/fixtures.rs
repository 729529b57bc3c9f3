//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: an authority, users issued by
//! it, and a server on a loopback port backed by a memory registry.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

use latchkey_pki::{
    generate_ca, generate_client_cert, generate_server_cert, Certificate, CertifiedKey, Signer,
    Subject,
};
use latchkey_registry::{Identity, IdentityRole, MemoryRegistry, Registry};
use latchkey_rpc::{tls, Client, Dispatcher, RpcConfig, Server, ServerHandle};

/// Host name every fixture server certificate is issued for.
pub const TEST_SERVER_NAME: &str = "latchkey.test";

/// Key size used by fixtures.
pub const TEST_KEY_BITS: u32 = 2048;

/// Server credentials plus whatever signs client certificates.
pub struct TestAuthority {
    /// The authority, or `None` when the server certificate signs clients.
    pub ca: Option<CertifiedKey>,
    pub server: CertifiedKey,
}

impl TestAuthority {
    /// A separate authority signing the server and clients.
    pub fn chained() -> anyhow::Result<Self> {
        let ca = generate_ca(TEST_KEY_BITS, Subject::default(), &[])?;
        let server = generate_server_cert(TEST_KEY_BITS, TEST_SERVER_NAME, Signer::Issuer(&ca))?;
        Ok(Self {
            ca: Some(ca),
            server,
        })
    }

    /// A self-signed server certificate that also signs clients.
    pub fn self_signed() -> anyhow::Result<Self> {
        let server = generate_server_cert(TEST_KEY_BITS, TEST_SERVER_NAME, Signer::SelfSigned)?;
        Ok(Self { ca: None, server })
    }

    fn signer(&self) -> &CertifiedKey {
        self.ca.as_ref().unwrap_or(&self.server)
    }

    pub fn trust_anchor(&self) -> &Certificate {
        &self.signer().certificate
    }

    /// A fresh client certificate, not registered anywhere.
    pub fn issue_client(&self) -> anyhow::Result<CertifiedKey> {
        Ok(generate_client_cert(TEST_KEY_BITS, self.signer())?)
    }
}

/// A registered user and its credentials.
pub struct TestUser {
    pub identity: Identity,
    pub key: CertifiedKey,
}

/// A running server on a loopback port.
pub struct TestServer {
    pub authority: TestAuthority,
    pub registry: Arc<MemoryRegistry>,
    handle: ServerHandle,
}

impl TestServer {
    /// Chained authority, built-in handlers, default settings.
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(TestAuthority::chained()?, Dispatcher::standard(), RpcConfig::default())
            .await
    }

    pub async fn start_with(
        authority: TestAuthority,
        dispatcher: Dispatcher,
        config: RpcConfig,
    ) -> anyhow::Result<Self> {
        let registry = Arc::new(MemoryRegistry::new());
        let tls = tls::server_config(&authority.server, authority.trust_anchor())?;
        let handle = Server::bind("127.0.0.1:0", tls, Arc::clone(&registry), dispatcher, config)
            .await?
            .spawn()?;
        Ok(Self {
            authority,
            registry,
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.handle.local_addr()
    }

    /// Issue a client certificate and register it.
    pub async fn provision(
        &self,
        email: &str,
        name: &str,
        role: IdentityRole,
    ) -> anyhow::Result<TestUser> {
        let key = self.authority.issue_client()?;
        let identity = Identity::new(email, name, role);
        self.registry
            .insert(key.public_key_der()?.as_bytes(), &identity)
            .await?;
        Ok(TestUser { identity, key })
    }

    pub async fn dial(&self, user: &TestUser) -> latchkey_rpc::Result<Client> {
        self.dial_with(&user.key).await
    }

    /// Dial with arbitrary credentials, registered or not.
    pub async fn dial_with(&self, key: &CertifiedKey) -> latchkey_rpc::Result<Client> {
        Client::dial(self.addr(), TEST_SERVER_NAME, key, self.authority.trust_anchor()).await
    }

    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.handle.shutdown(None).await?;
        Ok(())
    }
}

/// Serves a byte buffer at most `chunk` bytes per read.
pub struct ChunkedReader {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
}

impl ChunkedReader {
    pub fn new(data: Vec<u8>, chunk: usize) -> Self {
        Self {
            data,
            pos: 0,
            chunk: chunk.max(1),
        }
    }
}

impl AsyncRead for ChunkedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let take = self.chunk.min(buf.remaining());
        let start = self.pos;
        let end = (start + take).min(self.data.len());
        buf.put_slice(&self.data[start..end]);
        self.pos = end;
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_rpc::{read_frame, Frame, MAX_PAYLOAD_LEN};

    #[test]
    fn test_chained_authority() {
        let authority = TestAuthority::chained().unwrap();
        let client = authority.issue_client().unwrap();
        client
            .certificate
            .verify_issued_by(authority.trust_anchor())
            .unwrap();
        authority
            .server
            .certificate
            .verify_issued_by(authority.trust_anchor())
            .unwrap();
    }

    #[test]
    fn test_self_signed_authority() {
        let authority = TestAuthority::self_signed().unwrap();
        assert_eq!(authority.trust_anchor(), &authority.server.certificate);
        let client = authority.issue_client().unwrap();
        client
            .certificate
            .verify_issued_by(authority.trust_anchor())
            .unwrap();
    }

    #[tokio::test]
    async fn test_chunked_reader_delivers_everything() {
        let frame = Frame::new(3, vec![7u8; 40]);
        let mut reader = ChunkedReader::new(frame.to_bytes().to_vec(), 3);
        let read = read_frame(&mut reader, MAX_PAYLOAD_LEN).await.unwrap();
        assert_eq!(read, Some(frame));
        assert_eq!(read_frame(&mut reader, MAX_PAYLOAD_LEN).await.unwrap(), None);
    }
}
