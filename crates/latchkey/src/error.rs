//! Error types for store bootstrap and provisioning.

use std::path::PathBuf;

use latchkey_pki::PkiError;
use latchkey_registry::RegistryError;
use latchkey_rpc::RpcError;
use thiserror::Error;

/// Errors that can occur during directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Key or certificate error.
    #[error("pki error: {0}")]
    Pki(#[from] PkiError),

    /// Registry error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Transport error.
    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    /// Configuration file could not be parsed or written.
    #[error("config error: {0}")]
    Config(String),

    /// `create` was pointed at an existing path.
    #[error("{0} already exists")]
    AlreadyExists(PathBuf),

    /// Filesystem error.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DirectoryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DirectoryError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;
