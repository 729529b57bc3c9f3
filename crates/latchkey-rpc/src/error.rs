//! Error types for the RPC transport.

use thiserror::Error;

/// Violations of the framing or message protocol by the peer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Declared payload length exceeds the configured maximum.
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// The stream ended inside a frame.
    #[error("truncated frame: expected {expected} bytes, got {received}")]
    Truncated { expected: usize, received: usize },

    /// No handler is registered for the tag.
    #[error("unknown message type: {0}")]
    UnknownMessageType(u32),

    /// A frame carried a different tag than the one expected.
    #[error("message type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: u32, actual: u32 },

    /// The payload did not decode as the tagged message.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Errors that can occur on an RPC connection or while serving one.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The peer broke the protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Dialing, handshaking, or talking to the peer failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The peer's certificate is not registered.
    #[error("certificate not authorized")]
    Unauthorized,

    /// TLS configuration could not be built.
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Server settings are out of range.
    #[error("invalid server configuration: {0}")]
    InvalidConfig(String),

    /// A handler was registered twice for the same tag.
    #[error("duplicate handler for message type {0}")]
    DuplicateHandler(u32),

    /// A connection attempted an invalid lifecycle transition.
    #[error("invalid connection transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    /// A deadline elapsed.
    #[error("timeout: {0}")]
    Timeout(&'static str),

    /// Registry lookup failed for reasons other than a miss.
    #[error("registry error: {0}")]
    Registry(#[from] latchkey_registry::RegistryError),

    /// Key material could not be encoded or decoded.
    #[error("key material error: {0}")]
    Pki(#[from] latchkey_pki::PkiError),

    /// Message encoding failed on our side.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for RPC operations.
pub type Result<T> = std::result::Result<T, RpcError>;
