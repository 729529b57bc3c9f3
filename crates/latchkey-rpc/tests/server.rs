//! Server behaviour over real sockets.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use latchkey_pki::{generate_ca, generate_client_cert, generate_server_cert, CertifiedKey, Signer, Subject};
use latchkey_registry::{Identity, MemoryRegistry, Registry};
use latchkey_rpc::{tls, Client, Dispatcher, Frame, RpcConfig, RpcError, Server, ServerHandle};

const HOST: &str = "latchkey.test";

struct Harness {
    ca: CertifiedKey,
    registry: Arc<MemoryRegistry>,
    handle: ServerHandle,
}

impl Harness {
    async fn start(config: RpcConfig) -> Self {
        let ca = generate_ca(2048, Subject::default(), &[]).unwrap();
        let server = generate_server_cert(2048, HOST, Signer::Issuer(&ca)).unwrap();
        let registry = Arc::new(MemoryRegistry::new());
        let tls = tls::server_config(&server, &ca.certificate).unwrap();
        let handle = Server::bind("127.0.0.1:0", tls, registry.clone(), Dispatcher::standard(), config)
            .await
            .unwrap()
            .spawn()
            .unwrap();
        Self { ca, registry, handle }
    }

    async fn user(&self, email: &str) -> CertifiedKey {
        let key = generate_client_cert(2048, &self.ca).unwrap();
        self.registry
            .insert(key.public_key_der().unwrap().as_bytes(), &Identity::person(email, email))
            .await
            .unwrap();
        key
    }

    async fn dial(&self, key: &CertifiedKey) -> latchkey_rpc::Result<Client> {
        Client::dial(self.handle.local_addr(), HOST, key, &self.ca.certificate).await
    }
}

#[tokio::test]
async fn test_registered_client_pings() {
    let harness = Harness::start(RpcConfig::default()).await;
    let key = harness.user("a@x.com").await;

    let mut client = harness.dial(&key).await.unwrap();
    assert_eq!(client.ping(1).await.unwrap(), 1);
    assert_eq!(client.ping(-7).await.unwrap(), -7);
    assert_eq!(client.who_am_i().await.unwrap().email, "a@x.com");
    client.close().await.unwrap();

    harness.handle.shutdown(None).await.unwrap();
}

#[tokio::test]
async fn test_unregistered_client_refused() {
    let harness = Harness::start(RpcConfig::default()).await;
    let stranger = generate_client_cert(2048, &harness.ca).unwrap();

    let outcome = match harness.dial(&stranger).await {
        Ok(mut client) => client.ping(1).await.map(|_| ()),
        Err(e) => Err(e),
    };
    assert!(outcome.is_err());

    harness.handle.shutdown(None).await.unwrap();
}

#[tokio::test]
async fn test_foreign_anchor_refused() {
    let harness = Harness::start(RpcConfig::default()).await;
    let other_ca = generate_ca(2048, Subject::default(), &[]).unwrap();
    let foreign = generate_client_cert(2048, &other_ca).unwrap();
    harness
        .registry
        .insert(foreign.public_key_der().unwrap().as_bytes(), &Identity::person("f@x.com", "F"))
        .await
        .unwrap();

    let outcome = match harness.dial(&foreign).await {
        Ok(mut client) => client.ping(1).await.map(|_| ()),
        Err(e) => Err(e),
    };
    assert!(outcome.is_err());

    harness.handle.shutdown(None).await.unwrap();
}

#[tokio::test]
async fn test_unknown_message_closes_only_that_connection() {
    let harness = Harness::start(RpcConfig::default()).await;
    let key = harness.user("a@x.com").await;

    let mut client = harness.dial(&key).await.unwrap();
    client.send_frame(&Frame::new(99, Bytes::new())).await.unwrap();
    assert!(client.recv_frame().await.is_err());

    let mut second = harness.dial(&key).await.unwrap();
    assert_eq!(second.ping(5).await.unwrap(), 5);

    harness.handle.shutdown(None).await.unwrap();
}

#[tokio::test]
async fn test_idle_connection_closed() {
    let config = RpcConfig {
        idle_timeout: Some(Duration::from_millis(200)),
        ..RpcConfig::default()
    };
    let harness = Harness::start(config).await;
    let key = harness.user("a@x.com").await;

    let mut client = harness.dial(&key).await.unwrap();
    assert_eq!(client.ping(1).await.unwrap(), 1);
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(client.ping(2).await.is_err());

    harness.handle.shutdown(None).await.unwrap();
}

#[tokio::test]
async fn test_shutdown_drains_then_releases_listener() {
    let harness = Harness::start(RpcConfig::default()).await;
    let key = harness.user("a@x.com").await;
    let addr = harness.handle.local_addr();

    let mut client = harness.dial(&key).await.unwrap();
    assert_eq!(client.ping(1).await.unwrap(), 1);

    // The open connection outlives the drain window; shutdown still returns.
    harness
        .handle
        .shutdown(Some(Duration::from_millis(200)))
        .await
        .unwrap();

    let refused = Client::dial(addr, HOST, &key, &harness.ca.certificate).await;
    assert!(matches!(refused, Err(RpcError::Connection(_))));

    // Not aborted by shutdown.
    assert_eq!(client.ping(2).await.unwrap(), 2);
}

#[tokio::test]
async fn test_bind_rejects_zero_handshake_timeout() {
    let ca = generate_ca(2048, Subject::default(), &[]).unwrap();
    let server = generate_server_cert(2048, HOST, Signer::Issuer(&ca)).unwrap();
    let tls = tls::server_config(&server, &ca.certificate).unwrap();
    let config = RpcConfig {
        handshake_timeout: Duration::ZERO,
        ..RpcConfig::default()
    };

    let bound = Server::bind(
        "127.0.0.1:0",
        tls,
        Arc::new(MemoryRegistry::new()),
        Dispatcher::standard(),
        config,
    )
    .await;
    assert!(matches!(bound, Err(RpcError::InvalidConfig(_))));
}
