//! Strong type definitions for issued key material.

use serde::{Deserialize, Serialize};
use std::fmt;

/// DER-encoded SubjectPublicKeyInfo of a principal's key.
///
/// This is the registry key: two certificates carrying the same key produce
/// identical bytes, regardless of which certificate they came from.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKeyDer(Vec<u8>);

impl PublicKeyDer {
    /// Wrap raw SPKI bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self(hex::decode(s)?))
    }

    /// Short fingerprint for log lines: the trailing 8 bytes of the encoding,
    /// which fall inside the modulus for RSA keys.
    pub fn short(&self) -> String {
        let tail = self.0.len().saturating_sub(8);
        hex::encode(&self.0[tail..])
    }
}

impl fmt::Debug for PublicKeyDer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyDer({}, {} bytes)", self.short(), self.0.len())
    }
}

impl fmt::Display for PublicKeyDer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

impl AsRef<[u8]> for PublicKeyDer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for PublicKeyDer {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}
