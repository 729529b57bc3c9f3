//! # Latchkey Registry
//!
//! Public-key-indexed identity registry. Maps the DER SubjectPublicKeyInfo of
//! a principal's certificate key to an [`Identity`] record.
//!
//! ## Overview
//!
//! The registry is abstracted behind the [`Registry`] trait so the transport
//! and facade stay storage-agnostic. The primary implementation is
//! [`SqliteRegistry`], with [`MemoryRegistry`] for testing.
//!
//! ## Key Types
//!
//! - [`Registry`] - The async trait for all registry operations
//! - [`RegistryExt`] - `get` and `for_each` on top of any registry
//! - [`Identity`] - `{ email, name, role }` record
//! - [`IdentityRole`] - `ROOT` or `PERSON`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use latchkey_registry::{Identity, Registry, SqliteRegistry};
//!
//! async fn example(public_key: &[u8]) {
//!     let registry = SqliteRegistry::open("users.db").unwrap();
//!     registry
//!         .insert(public_key, &Identity::person("a@x.com", "A"))
//!         .await
//!         .unwrap();
//!     let identity = registry.lookup(public_key).await.unwrap();
//!     assert_eq!(identity.email, "a@x.com");
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Keys are opaque**: the registry never parses key bytes
//! - **Durable inserts**: committed before `insert` returns
//! - **No deletes**: entries are overwritten by re-insertion, never removed

pub mod error;
pub mod identity;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{RegistryError, Result};
pub use identity::{Identity, IdentityRole, RegistryEntry};
pub use memory::MemoryRegistry;
pub use sqlite::SqliteRegistry;
pub use traits::{Registry, RegistryExt};

/// Current time in Unix milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
