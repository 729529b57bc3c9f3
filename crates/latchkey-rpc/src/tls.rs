//! rustls configuration for mutually authenticated connections.
//!
//! Both sides trust exactly one anchor certificate: the authority in a
//! CA-backed deployment, or the server's own certificate when it signs
//! client certificates itself.

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs1KeyDer, ServerName};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};

use latchkey_pki::{Certificate, CertifiedKey};

use crate::error::{Result, RpcError};

fn root_store(anchor: &Certificate) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    roots
        .add(CertificateDer::from(anchor.to_der()?))
        .map_err(|e| RpcError::TlsConfig(format!("trust anchor: {e}")))?;
    Ok(roots)
}

fn presented(
    identity: &CertifiedKey,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let cert = CertificateDer::from(identity.certificate.to_der()?);
    let key = PrivateKeyDer::Pkcs1(PrivatePkcs1KeyDer::from(
        identity.private_key.to_pkcs1_der()?,
    ));
    Ok((vec![cert], key))
}

/// Server config that presents `identity` and requires a client
/// certificate chaining to `anchor`.
pub fn server_config(identity: &CertifiedKey, anchor: &Certificate) -> Result<Arc<ServerConfig>> {
    let verifier = WebPkiClientVerifier::builder(Arc::new(root_store(anchor)?))
        .build()
        .map_err(|e| RpcError::TlsConfig(format!("client verifier: {e}")))?;

    let (chain, key) = presented(identity)?;
    let config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(chain, key)
        .map_err(|e| RpcError::TlsConfig(e.to_string()))?;

    Ok(Arc::new(config))
}

/// Client config that presents `identity` and trusts only `anchor`.
pub fn client_config(identity: &CertifiedKey, anchor: &Certificate) -> Result<Arc<ClientConfig>> {
    let (chain, key) = presented(identity)?;
    let config = ClientConfig::builder()
        .with_root_certificates(root_store(anchor)?)
        .with_client_auth_cert(chain, key)
        .map_err(|e| RpcError::TlsConfig(e.to_string()))?;

    Ok(Arc::new(config))
}

/// Parse the host name the server certificate must be valid for.
pub fn server_name(name: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(name)
        .map(|parsed| parsed.to_owned())
        .map_err(|e| RpcError::Connection(format!("invalid server name {name:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use latchkey_pki::{generate_ca, generate_client_cert, generate_server_cert, Signer, Subject};

    #[test]
    fn test_configs_build_for_authority_chain() {
        let ca = generate_ca(2048, Subject::default(), &[]).unwrap();
        let server = generate_server_cert(2048, "latchkey.test", Signer::Issuer(&ca)).unwrap();
        let client = generate_client_cert(2048, &ca).unwrap();

        server_config(&server, &ca.certificate).unwrap();
        client_config(&client, &ca.certificate).unwrap();
    }

    #[test]
    fn test_configs_build_for_self_signed_server() {
        let server = generate_server_cert(2048, "latchkey.test", Signer::SelfSigned).unwrap();
        let client = generate_client_cert(2048, &server).unwrap();

        server_config(&server, &server.certificate).unwrap();
        client_config(&client, &server.certificate).unwrap();
    }

    #[test]
    fn test_server_name() {
        assert!(server_name("latchkey.test").is_ok());
        assert!(server_name("127.0.0.1").is_ok());
        assert!(matches!(server_name("not a host"), Err(RpcError::Connection(_))));
    }
}
