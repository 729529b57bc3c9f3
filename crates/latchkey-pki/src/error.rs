//! Error types for certificate and key issuance.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while generating, encoding, or verifying key material.
#[derive(Debug, Error)]
pub enum PkiError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("certificate issuance failed: {0}")]
    Issuance(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("unsupported key size: {bits} bits (minimum {min})")]
    KeySize { bits: u32, min: u32 },

    #[error("chain verification failed: {0}")]
    Verification(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PkiError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PkiError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for issuance operations.
pub type Result<T> = std::result::Result<T, PkiError>;
