//! # Latchkey
//!
//! A closed-membership service kit: a private certificate authority, a
//! registry that maps certificate public keys to identities, and an RPC
//! server that only talks to registered keys.
//!
//! ## Overview
//!
//! - **Issuance**: RSA keys and X.509 certificates for an authority, a
//!   server and each client
//! - **Registry**: DER public key to `{ email, name, role }`, durable in SQLite
//! - **Transport**: framed CBOR messages over TLS with client certificates
//!
//! A [`Directory`] ties the three together around a store directory on disk.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use latchkey::{BootstrapOptions, Directory, Dispatcher, IdentityRole};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let directory = Directory::create("data", BootstrapOptions::default()).await?;
//!
//!     let (identity, pem) = directory
//!         .create_user("a@x.com", "A", IdentityRole::Person)
//!         .await?;
//!     println!("{} -> {} bytes of key", identity.email, pem.private_key.len());
//!
//!     let handle = directory.serve(Dispatcher::standard()).await?;
//!     handle.shutdown(None).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `latchkey::pki` - Keys, certificates and PEM
//! - `latchkey::registry` - Registry trait and backends
//! - `latchkey::rpc` - Framing, dispatch, server and client

pub mod config;
pub mod directory;
pub mod error;

pub use latchkey_pki as pki;
pub use latchkey_registry as registry;
pub use latchkey_rpc as rpc;

pub use config::{Config, RpcSection, TrustMode, TrustSection, CONFIG_FILE, REGISTRY_FILE};
pub use directory::{BootstrapOptions, Directory, UserListing, ROOT_CERT_FILE, ROOT_KEY_FILE};
pub use error::{DirectoryError, Result};

pub use latchkey_pki::{Certificate, CertifiedKey, PemPair, PrivateKey, PublicKeyDer};
pub use latchkey_registry::{Identity, IdentityRole, MemoryRegistry, Registry, SqliteRegistry};
pub use latchkey_rpc::{Client, Dispatcher, RpcConfig, ServerHandle};
