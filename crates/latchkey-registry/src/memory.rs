//! In-memory implementation of the Registry trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{RegistryError, Result};
use crate::identity::{Identity, RegistryEntry};
use crate::traits::Registry;

/// In-memory registry.
///
/// All data is lost when the registry is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryRegistry {
    entries: RwLock<BTreeMap<Vec<u8>, Identity>>,
}

impl MemoryRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> RegistryError {
    RegistryError::InvalidData(format!("lock poisoned: {e}"))
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn insert(&self, key: &[u8], identity: &Identity) -> Result<()> {
        if key.is_empty() {
            return Err(RegistryError::InvalidData("empty public key".into()));
        }
        self.entries
            .write()
            .map_err(poisoned)?
            .insert(key.to_vec(), identity.clone());
        Ok(())
    }

    async fn lookup(&self, key: &[u8]) -> Result<Identity> {
        self.entries
            .read()
            .map_err(poisoned)?
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(key))
    }

    async fn snapshot(&self) -> Result<Vec<RegistryEntry>> {
        Ok(self
            .entries
            .read()
            .map_err(poisoned)?
            .iter()
            .map(|(key, identity)| RegistryEntry {
                key: key.clone(),
                identity: identity.clone(),
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(poisoned)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::RegistryExt;

    #[tokio::test]
    async fn test_insert_lookup_miss() {
        let registry = MemoryRegistry::new();
        let identity = Identity::person("a@x.com", "A");
        registry.insert(b"key-a", &identity).await.unwrap();

        assert_eq!(registry.lookup(b"key-a").await.unwrap(), identity);
        assert!(registry.lookup(b"key-b").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_for_each_counts_entries() {
        let registry = MemoryRegistry::new();
        registry
            .insert(b"k1", &Identity::person("1@x.com", "One"))
            .await
            .unwrap();
        registry
            .insert(b"k2", &Identity::root("2@x.com", "Two"))
            .await
            .unwrap();

        let mut emails = Vec::new();
        let visited = registry
            .for_each(|_, identity| {
                emails.push(identity.email.clone());
                Ok::<(), RegistryError>(())
            })
            .await
            .unwrap();

        assert_eq!(visited, 2);
        assert_eq!(emails, vec!["1@x.com", "2@x.com"]);
    }
}
