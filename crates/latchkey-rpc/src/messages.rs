//! RPC message types.
//!
//! Each message type is tagged with the `u32` that appears in the frame
//! header. A request and its response share one tag. Payloads are CBOR.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use latchkey_registry::{Identity, IdentityRole};

use crate::error::{ProtocolError, Result, RpcError};
use crate::frame::Frame;

/// Wire tags.
pub mod tags {
    /// Liveness probe.
    pub const PING: u32 = 0;
    /// Authenticated identity of the connection.
    pub const WHO_AM_I: u32 = 1;
}

/// A typed message carried in a frame.
pub trait Message: Serialize + DeserializeOwned + Send {
    /// Tag written in the frame header.
    const TYPE: u32;

    /// CBOR payload.
    fn encode(&self) -> Result<Bytes> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| RpcError::Encoding(e.to_string()))?;
        Ok(Bytes::from(buf))
    }

    /// Decode a CBOR payload.
    fn decode(payload: &[u8]) -> Result<Self> {
        ciborium::from_reader(payload)
            .map_err(|e| ProtocolError::MalformedPayload(e.to_string()).into())
    }

    /// Wrap into a frame.
    fn to_frame(&self) -> Result<Frame> {
        Ok(Frame::new(Self::TYPE, self.encode()?))
    }

    /// Unwrap from a frame, checking the tag.
    fn from_frame(frame: &Frame) -> Result<Self> {
        if frame.msg_type != Self::TYPE {
            return Err(ProtocolError::TypeMismatch {
                expected: Self::TYPE,
                actual: frame.msg_type,
            }
            .into());
        }
        Self::decode(&frame.payload)
    }
}

/// Liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingRequest {
    pub id: i32,
}

/// Echo of a [`PingRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {
    pub id: i32,
}

impl Message for PingRequest {
    const TYPE: u32 = tags::PING;
}

impl Message for PingResponse {
    const TYPE: u32 = tags::PING;
}

/// Ask the server which identity this connection authenticated as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoAmIRequest {}

/// The identity the server resolved for this connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoAmIResponse {
    pub email: String,
    pub name: String,
    pub role: IdentityRole,
}

impl From<&Identity> for WhoAmIResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            email: identity.email.clone(),
            name: identity.name.clone(),
            role: identity.role,
        }
    }
}

impl Message for WhoAmIRequest {
    const TYPE: u32 = tags::WHO_AM_I;
}

impl Message for WhoAmIResponse {
    const TYPE: u32 = tags::WHO_AM_I;
}
