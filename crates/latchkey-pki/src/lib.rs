//! # Latchkey PKI
//!
//! Key and certificate issuance for a closed-membership service.
//!
//! This crate does no networking and keeps no state. It generates RSA keys,
//! issues X.509 certificates for three roles, and moves them in and out of
//! PEM.
//!
//! ## Key Types
//!
//! - [`IssuanceRequest`] - Parameters for one certificate
//! - [`CertifiedKey`] - A certificate with its private key
//! - [`PublicKeyDer`] - DER SubjectPublicKeyInfo, the registry key of a principal
//! - [`PemPair`] - PEM text of a certificate and key
//!
//! ## Roles
//!
//! - Authority: self-signed, `CA:TRUE`, signs everything else
//! - Server: presented to clients, valid for the configured host name
//! - Client: one per user, signed by the authority (or by a self-signed
//!   server certificate when no separate authority is deployed)

pub mod cert;
pub mod crypto;
pub mod error;
pub mod issue;
pub mod pem;
pub mod types;

pub use cert::{Certificate, CertifiedKey};
pub use crypto::{PrivateKey, DEFAULT_KEY_BITS, MIN_KEY_BITS};
pub use error::{PkiError, Result};
pub use issue::{
    generate_ca, generate_client_cert, generate_server_cert, CertRole, IssuanceRequest, Signer,
    Subject, VALIDITY_DAYS,
};
pub use pem::PemPair;
pub use types::PublicKeyDer;
