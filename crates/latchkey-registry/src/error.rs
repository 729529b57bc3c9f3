//! Error types for the registry.

use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Identity record encoding/decoding error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// No identity registered under the key (hex prefix of the key).
    #[error("no identity registered for key {0}")]
    NotFound(String),

    /// Invalid input or stored data.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

impl RegistryError {
    /// True for a lookup miss, false for storage failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }

    pub(crate) fn not_found(key: &[u8]) -> Self {
        let tail = key.len().saturating_sub(8);
        RegistryError::NotFound(hex::encode(&key[tail..]))
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_misses_are_not_found() {
        let miss = RegistryError::not_found(&[0xaa; 32]);
        assert!(miss.is_not_found());
        assert_eq!(miss.to_string(), "no identity registered for key aaaaaaaaaaaaaaaa");

        let storage = RegistryError::from(rusqlite::Error::InvalidQuery);
        assert!(!storage.is_not_found());
        assert!(matches!(storage, RegistryError::Database(_)));
    }
}
