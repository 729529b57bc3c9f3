//! # Latchkey Testkit
//!
//! Testing utilities for Latchkey.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Exact wire bytes of the built-in messages
//! - **Generators**: Proptest strategies for identities, registry contents
//!   and frames
//! - **Fixtures**: In-process authorities, users and running servers
//!
//! ## Golden Vectors
//!
//! ```rust
//! use latchkey_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, hex) in verify_all_vectors() {
//!     assert!(matches, "{name}: {hex}");
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use latchkey_registry::IdentityRole;
//! use latchkey_testkit::fixtures::TestServer;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let server = TestServer::start().await?;
//!     let user = server.provision("a@x.com", "A", IdentityRole::Person).await?;
//!     let mut client = server.dial(&user).await?;
//!     assert_eq!(client.ping(1).await?, 1);
//!     server.shutdown().await
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{ChunkedReader, TestAuthority, TestServer, TestUser, TEST_SERVER_NAME};
pub use vectors::{all_vectors, verify_all_vectors, WireVector};
