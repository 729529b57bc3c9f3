//! SQLite implementation of the Registry trait.
//!
//! This is the persistent backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{RegistryError, Result};
use crate::identity::{Identity, RegistryEntry};
use crate::migration;
use crate::traits::Registry;

/// SQLite-based registry.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime. A file-backed registry runs in WAL
/// mode with `synchronous=FULL`, so an insert is on disk once it returns,
/// and in exclusive locking mode, so only one process uses the file.
pub struct SqliteRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRegistry {
    /// Open (creating if needed) a registry file and run migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut conn = Connection::open(path)?;

        conn.pragma_update_and_check(None, "locking_mode", "EXCLUSIVE", |row| {
            row.get::<_, String>(0)
        })?;
        let journal: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !journal.eq_ignore_ascii_case("wal") {
            tracing::warn!(path = %path.display(), journal = %journal, "registry not in WAL mode");
        }
        conn.pragma_update(None, "synchronous", "FULL")?;

        migration::migrate(&mut conn)?;
        tracing::debug!(path = %path.display(), "registry opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory registry.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                RegistryError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            RegistryError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }
}

#[async_trait]
impl Registry for SqliteRegistry {
    async fn insert(&self, key: &[u8], identity: &Identity) -> Result<()> {
        if key.is_empty() {
            return Err(RegistryError::InvalidData("empty public key".into()));
        }
        let key = key.to_vec();
        let record = identity.to_bytes()?;

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO identities (public_key, record, inserted_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(public_key) DO UPDATE
                 SET record = excluded.record, inserted_at = excluded.inserted_at",
                params![key, record, crate::now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn lookup(&self, key: &[u8]) -> Result<Identity> {
        let key = key.to_vec();

        self.blocking(move |conn| {
            let record: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT record FROM identities WHERE public_key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;

            match record {
                Some(bytes) => Identity::from_bytes(&bytes),
                None => Err(RegistryError::not_found(&key)),
            }
        })
        .await
    }

    async fn snapshot(&self) -> Result<Vec<RegistryEntry>> {
        let rows = self
            .blocking(|conn| {
                let tx = conn.transaction()?;
                let rows = {
                    let mut stmt = tx.prepare(
                        "SELECT public_key, record FROM identities ORDER BY public_key",
                    )?;
                    let rows = stmt
                        .query_map([], |row| {
                            Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
                        })?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    rows
                };
                tx.commit()?;
                Ok(rows)
            })
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for (key, record) in rows {
            match Identity::from_bytes(&record) {
                Ok(identity) => entries.push(RegistryEntry { key, identity }),
                Err(e) => {
                    tracing::warn!(key = %hex::encode(&key), error = %e, "skipping undecodable identity record");
                }
            }
        }
        Ok(entries)
    }

    async fn count(&self) -> Result<usize> {
        self.blocking(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}
