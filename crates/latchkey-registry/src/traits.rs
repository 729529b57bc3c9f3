//! Registry trait: the abstract interface for identity persistence.
//!
//! Keys are DER SubjectPublicKeyInfo bytes handed in by the caller; the
//! registry never parses them. Implementations include SQLite (primary) and
//! in-memory (for tests).

use async_trait::async_trait;

use crate::error::{RegistryError, Result};
use crate::identity::{Identity, RegistryEntry};

/// The Registry trait: async interface mapping public keys to identities.
///
/// # Design Notes
///
/// - **Durable inserts**: `insert` returns only once the entry is committed.
/// - **Overwrite on re-insert**: inserting under an existing key replaces the
///   record. Entries are never deleted.
/// - **Snapshot reads**: `snapshot` returns a consistent view even while
///   inserts run concurrently.
#[async_trait]
pub trait Registry: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace the identity registered under `key`.
    async fn insert(&self, key: &[u8], identity: &Identity) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve a key to its identity.
    ///
    /// Returns `RegistryError::NotFound` when nothing is registered under it.
    async fn lookup(&self, key: &[u8]) -> Result<Identity>;

    /// All entries, ordered by key, from a single consistent read.
    async fn snapshot(&self) -> Result<Vec<RegistryEntry>>;

    /// Number of registered keys.
    async fn count(&self) -> Result<usize>;
}

/// Extension methods for registries.
pub trait RegistryExt: Registry {
    /// Like `lookup`, with a miss mapped to `None`.
    fn get(&self, key: &[u8]) -> impl std::future::Future<Output = Result<Option<Identity>>> + Send;

    /// Visit every entry in key order over one snapshot.
    ///
    /// A visitor error stops the scan and is returned. On success the number
    /// of visited entries is returned.
    fn for_each<F, E>(
        &self,
        visitor: F,
    ) -> impl std::future::Future<Output = std::result::Result<usize, E>> + Send
    where
        F: FnMut(&[u8], &Identity) -> std::result::Result<(), E> + Send,
        E: From<RegistryError> + Send;
}

impl<R: Registry + ?Sized> RegistryExt for R {
    async fn get(&self, key: &[u8]) -> Result<Option<Identity>> {
        match self.lookup(key).await {
            Ok(identity) => Ok(Some(identity)),
            Err(RegistryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn for_each<F, E>(&self, mut visitor: F) -> std::result::Result<usize, E>
    where
        F: FnMut(&[u8], &Identity) -> std::result::Result<(), E> + Send,
        E: From<RegistryError> + Send,
    {
        let entries = self.snapshot().await?;
        for entry in &entries {
            visitor(&entry.key, &entry.identity)?;
        }
        Ok(entries.len())
    }
}
