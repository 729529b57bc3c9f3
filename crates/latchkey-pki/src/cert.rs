//! X.509 certificates and certificate/key pairs.

use openssl::nid::Nid;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509StoreContext, X509};
use std::fmt;

use crate::crypto::PrivateKey;
use crate::error::{PkiError, Result};
use crate::pem::PemPair;
use crate::types::PublicKeyDer;

/// An X.509 certificate.
#[derive(Clone)]
pub struct Certificate {
    x509: X509,
}

impl Certificate {
    /// Parse the first `CERTIFICATE` section of a PEM text. Other sections
    /// in the same text are skipped.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let x509 =
            X509::from_pem(pem).map_err(|e| PkiError::Decode(format!("certificate: {e}")))?;
        Ok(Self { x509 })
    }

    /// Parse a DER certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let x509 =
            X509::from_der(der).map_err(|e| PkiError::Decode(format!("certificate: {e}")))?;
        Ok(Self { x509 })
    }

    /// PEM encoding as a single `CERTIFICATE` section.
    pub fn to_pem(&self) -> Result<String> {
        let pem = self
            .x509
            .to_pem()
            .map_err(|e| PkiError::Encode(e.to_string()))?;
        String::from_utf8(pem).map_err(|e| PkiError::Encode(e.to_string()))
    }

    /// DER encoding.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.x509.to_der().map_err(|e| PkiError::Encode(e.to_string()))
    }

    /// DER SubjectPublicKeyInfo of the certified key.
    pub fn public_key_der(&self) -> Result<PublicKeyDer> {
        let public = self
            .x509
            .public_key()
            .map_err(|e| PkiError::Decode(format!("certificate public key: {e}")))?;
        public
            .public_key_to_der()
            .map(PublicKeyDer::from)
            .map_err(|e| PkiError::Encode(e.to_string()))
    }

    /// Serial number as upper-case hex.
    pub fn serial_hex(&self) -> Result<String> {
        let bn = self
            .x509
            .serial_number()
            .to_bn()
            .map_err(|e| PkiError::Decode(e.to_string()))?;
        let hex = bn.to_hex_str().map_err(|e| PkiError::Decode(e.to_string()))?;
        Ok(hex.to_string())
    }

    /// Start of the validity window, as printed by OpenSSL.
    pub fn not_before(&self) -> String {
        self.x509.not_before().to_string()
    }

    /// End of the validity window, as printed by OpenSSL.
    pub fn not_after(&self) -> String {
        self.x509.not_after().to_string()
    }

    /// Subject common name, if present.
    pub fn common_name(&self) -> Option<String> {
        self.x509
            .subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .and_then(|entry| std::str::from_utf8(entry.data().as_slice()).ok())
            .map(str::to_string)
    }

    /// DNS names from the subject alternative name extension.
    pub fn dns_names(&self) -> Vec<String> {
        self.x509
            .subject_alt_names()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| name.dnsname().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether this certificate certifies `key`.
    pub fn matches_key(&self, key: &PrivateKey) -> Result<bool> {
        Ok(self.public_key_der()? == key.public_key_der()?)
    }

    /// Verify this certificate against `anchor` as the only trust root.
    pub fn verify_issued_by(&self, anchor: &Certificate) -> Result<()> {
        let verification = |e: openssl::error::ErrorStack| PkiError::Verification(e.to_string());

        let mut builder = X509StoreBuilder::new().map_err(verification)?;
        builder.add_cert(anchor.x509.clone()).map_err(verification)?;
        let store = builder.build();

        let chain = Stack::new().map_err(verification)?;
        let mut context = X509StoreContext::new().map_err(verification)?;
        let failure = context
            .init(&store, &self.x509, &chain, |ctx| {
                let ok = ctx.verify_cert()?;
                Ok(if ok {
                    None
                } else {
                    Some(ctx.error().to_string())
                })
            })
            .map_err(verification)?;

        match failure {
            None => Ok(()),
            Some(reason) => Err(PkiError::Verification(reason)),
        }
    }

    pub(crate) fn as_x509(&self) -> &X509 {
        &self.x509
    }

    pub(crate) fn from_x509(x509: X509) -> Self {
        Self { x509 }
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("common_name", &self.common_name())
            .field("serial", &self.serial_hex().ok())
            .field("not_after", &self.not_after())
            .finish()
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        match (self.to_der(), other.to_der()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// A certificate together with the private key it certifies.
#[derive(Clone)]
pub struct CertifiedKey {
    pub certificate: Certificate,
    pub private_key: PrivateKey,
}

impl CertifiedKey {
    /// Pair a certificate with its key, rejecting mismatches.
    pub fn new(certificate: Certificate, private_key: PrivateKey) -> Result<Self> {
        if !certificate.matches_key(&private_key)? {
            return Err(PkiError::Decode(
                "private key does not match certificate".into(),
            ));
        }
        Ok(Self {
            certificate,
            private_key,
        })
    }

    /// Decode from a certificate PEM and a key PEM. The two arguments may be
    /// the same combined text.
    pub fn from_pem(certificate_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        let certificate = Certificate::from_pem(certificate_pem)?;
        let private_key = PrivateKey::from_pem(key_pem)?;
        Self::new(certificate, private_key)
    }

    /// Encode both halves as PEM.
    pub fn to_pem(&self) -> Result<PemPair> {
        Ok(PemPair {
            certificate: self.certificate.to_pem()?,
            private_key: self.private_key.to_pem()?,
        })
    }

    /// Registry key of this identity.
    pub fn public_key_der(&self) -> Result<PublicKeyDer> {
        self.private_key.public_key_der()
    }
}

impl fmt::Debug for CertifiedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertifiedKey")
            .field("certificate", &self.certificate)
            .field("private_key", &self.private_key)
            .finish()
    }
}
