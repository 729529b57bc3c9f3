//! Server-side connection lifecycle.

use std::fmt;
use std::net::SocketAddr;

use crate::error::{Result, RpcError};

/// Where a server-side connection is in its lifecycle.
///
/// ```text
/// Accepted -> Handshaking -> Authenticated -> Serving -> Closed
///                  |               |
///                  +--> Rejected <-+--> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// TCP connection accepted.
    Accepted,
    /// TLS handshake in progress.
    Handshaking,
    /// Handshake complete, certificate chain verified.
    Authenticated,
    /// Identity resolved, exchanging messages.
    Serving,
    /// Handshake or identity resolution failed.
    Rejected,
    /// Socket released.
    Closed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Accepted => "accepted",
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Authenticated => "authenticated",
            ConnectionState::Serving => "serving",
            ConnectionState::Rejected => "rejected",
            ConnectionState::Closed => "closed",
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_advance(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Accepted, Handshaking)
                | (Handshaking, Authenticated)
                | (Handshaking, Rejected)
                | (Authenticated, Serving)
                | (Authenticated, Rejected)
                | (Serving, Closed)
                | (Rejected, Closed)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the lifecycle of one accepted connection.
#[derive(Debug)]
pub struct Connection {
    peer_addr: SocketAddr,
    state: ConnectionState,
}

impl Connection {
    pub fn new(peer_addr: SocketAddr) -> Self {
        Self {
            peer_addr,
            state: ConnectionState::Accepted,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Move to `next`, refusing transitions the lifecycle does not allow.
    pub fn advance(&mut self, next: ConnectionState) -> Result<()> {
        if !self.state.can_advance(next) {
            return Err(RpcError::InvalidTransition {
                from: self.state.as_str(),
                to: next.as_str(),
            });
        }
        tracing::trace!(peer = %self.peer_addr, from = %self.state, to = %next, "connection state");
        self.state = next;
        Ok(())
    }

    /// Reject from the current state, then close.
    pub fn reject(&mut self) -> Result<()> {
        self.advance(ConnectionState::Rejected)?;
        self.advance(ConnectionState::Closed)
    }
}
