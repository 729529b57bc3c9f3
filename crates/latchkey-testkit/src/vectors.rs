//! Golden wire vectors.
//!
//! Exact bytes of the built-in messages as they appear on the wire. Any
//! client implementation must produce and accept these.

use latchkey_registry::{Identity, IdentityRole};
use latchkey_rpc::{Frame, Message, PingRequest, PingResponse, WhoAmIRequest, WhoAmIResponse};

/// A golden wire vector.
#[derive(Debug, Clone)]
pub struct WireVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Builds the frame from a typed message.
    pub build: fn() -> latchkey_rpc::Result<Frame>,
    /// Expected header and payload (hex).
    pub expected_hex: &'static str,
}

/// Get all golden wire vectors.
pub fn all_vectors() -> Vec<WireVector> {
    vec![
        WireVector {
            name: "ping id 1",
            build: || PingRequest { id: 1 }.to_frame(),
            expected_hex: "0000000000000005a162696401",
        },
        WireVector {
            name: "ping id 0",
            build: || PingRequest { id: 0 }.to_frame(),
            expected_hex: "0000000000000005a162696400",
        },
        WireVector {
            name: "ping id -1",
            build: || PingRequest { id: -1 }.to_frame(),
            expected_hex: "0000000000000005a162696420",
        },
        WireVector {
            name: "ping response id 1000",
            build: || PingResponse { id: 1000 }.to_frame(),
            expected_hex: "0000000000000007a16269641903e8",
        },
        WireVector {
            name: "who-am-i request",
            build: || WhoAmIRequest {}.to_frame(),
            expected_hex: "0000000100000001a0",
        },
        WireVector {
            name: "who-am-i response",
            build: || WhoAmIResponse::from(&Identity::new("a@x.com", "A", IdentityRole::Person)).to_frame(),
            expected_hex: "0000000100000022a365656d61696c676140782e636f6d646e616d65614164726f6c6566504552534f4e",
        },
    ]
}

/// Encode every vector and compare against its expected bytes.
///
/// Returns `(name, matches, actual_hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let actual = match (v.build)() {
                Ok(frame) => hex::encode(frame.to_bytes()),
                Err(e) => format!("<encode failed: {e}>"),
            };
            (v.name.to_string(), actual == v.expected_hex, actual)
        })
        .collect()
}
