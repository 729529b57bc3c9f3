//! Peer authentication against the registry.

use rustls::pki_types::CertificateDer;

use latchkey_pki::Certificate;
use latchkey_registry::{Identity, Registry};

use crate::error::{Result, RpcError};

/// Resolve the identity of a peer from the certificates it presented.
///
/// Certificates are tried in order and the first registered key wins.
/// Certificates that do not parse and keys that are not registered are
/// skipped. A registry failure other than a miss aborts.
pub async fn authenticate<R: Registry + ?Sized>(
    peer_certificates: &[CertificateDer<'_>],
    registry: &R,
) -> Result<Identity> {
    for (index, der) in peer_certificates.iter().enumerate() {
        let key = match Certificate::from_der(der.as_ref()).and_then(|c| c.public_key_der()) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!(index, error = %e, "skipping undecodable peer certificate");
                continue;
            }
        };

        match registry.lookup(key.as_bytes()).await {
            Ok(identity) => return Ok(identity),
            Err(e) if e.is_not_found() => {
                tracing::debug!(index, key = %key, "peer key not registered");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(RpcError::Unauthorized)
}
