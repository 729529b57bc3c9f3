//! # Latchkey RPC
//!
//! Length-prefixed message exchange over mutually authenticated TLS.
//!
//! ## Overview
//!
//! Every connection presents a client certificate that chains to a single
//! trust anchor. The server takes the public key of that certificate, looks
//! it up in a [`Registry`](latchkey_registry::Registry), and serves the
//! connection as the resolved identity. A key that is not registered is
//! refused even when its certificate verifies.
//!
//! ## Wire Format
//!
//! ```text
//! +----------------+----------------+----------------------+
//! | type (u32 BE)  | length (u32 BE)| payload (CBOR)       |
//! +----------------+----------------+----------------------+
//! ```
//!
//! A request and its response carry the same type tag. Requests on one
//! connection are answered in order.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use latchkey_pki::{Certificate, CertifiedKey};
//! use latchkey_registry::MemoryRegistry;
//! use latchkey_rpc::{tls, Client, Dispatcher, RpcConfig, Server};
//!
//! async fn example(server_key: CertifiedKey, user_key: CertifiedKey, anchor: Certificate) {
//!     let registry = Arc::new(MemoryRegistry::new());
//!     let config = tls::server_config(&server_key, &anchor).unwrap();
//!     let server = Server::bind("127.0.0.1:0", config, registry, Dispatcher::standard(), RpcConfig::default())
//!         .await
//!         .unwrap();
//!     let handle = server.spawn().unwrap();
//!
//!     let mut client = Client::dial(handle.local_addr(), "localhost", &user_key, &anchor)
//!         .await
//!         .unwrap();
//!     assert_eq!(client.ping(1).await.unwrap(), 1);
//!
//!     handle.shutdown(None).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **One task per connection**: a failing connection never stops the
//!   accept loop
//! - **Bounded frames**: oversize length prefixes fail before allocation
//! - **Draining shutdown**: open connections are waited on, never aborted

pub mod auth;
pub mod client;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod messages;
pub mod server;
pub mod tls;

pub use auth::authenticate;
pub use client::Client;
pub use connection::{Connection, ConnectionState};
pub use dispatch::{Dispatcher, DispatcherBuilder, Handler, PingHandler, Session, WhoAmIHandler};
pub use error::{ProtocolError, Result, RpcError};
pub use frame::{read_frame, write_frame, Frame, HEADER_LEN, MAX_ENCODABLE_LEN, MAX_PAYLOAD_LEN};
pub use messages::{tags, Message, PingRequest, PingResponse, WhoAmIRequest, WhoAmIResponse};
pub use server::{RpcConfig, Server, ServerHandle, ACCEPT_BACKOFF, DEFAULT_HANDSHAKE_TIMEOUT};
