//! Message dispatch.
//!
//! A [`Dispatcher`] is a fixed table from wire tag to handler, built once
//! before the server starts. Registering two handlers for one tag fails at
//! build time; a frame with an unregistered tag fails at dispatch time.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

use latchkey_registry::Identity;

use crate::error::{ProtocolError, Result, RpcError};
use crate::frame::Frame;
use crate::messages::{
    tags, Message, PingRequest, PingResponse, WhoAmIRequest, WhoAmIResponse,
};

/// Per-connection context handed to handlers.
#[derive(Debug, Clone)]
pub struct Session {
    /// Identity resolved from the peer certificate.
    pub identity: Identity,
    pub peer_addr: SocketAddr,
}

/// Handles one message type.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Produce the response frame for a request frame.
    async fn handle(&self, session: &Session, frame: Frame) -> Result<Frame>;
}

/// Tag-to-handler table.
#[derive(Clone)]
pub struct Dispatcher {
    handlers: HashMap<u32, Arc<dyn Handler>>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// The built-in table: `Ping` and `WhoAmI`.
    pub fn standard() -> Self {
        Self::standard_builder().build()
    }

    /// A builder pre-loaded with the built-in handlers.
    pub fn standard_builder() -> DispatcherBuilder {
        let mut handlers: HashMap<u32, Arc<dyn Handler>> = HashMap::new();
        handlers.insert(tags::PING, Arc::new(PingHandler));
        handlers.insert(tags::WHO_AM_I, Arc::new(WhoAmIHandler));
        DispatcherBuilder { handlers }
    }

    /// Route a frame to its handler.
    pub async fn dispatch(&self, session: &Session, frame: Frame) -> Result<Frame> {
        let handler = self
            .handlers
            .get(&frame.msg_type)
            .ok_or(ProtocolError::UnknownMessageType(frame.msg_type))?;
        handler.handle(session, frame).await
    }

    pub fn handles(&self, msg_type: u32) -> bool {
        self.handlers.contains_key(&msg_type)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.handlers.keys().copied().collect();
        tags.sort_unstable();
        f.debug_struct("Dispatcher").field("tags", &tags).finish()
    }
}

/// Builds a [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    handlers: HashMap<u32, Arc<dyn Handler>>,
}

impl DispatcherBuilder {
    /// Add a handler. Fails if the tag already has one.
    pub fn register(mut self, msg_type: u32, handler: impl Handler + 'static) -> Result<Self> {
        if self.handlers.contains_key(&msg_type) {
            return Err(RpcError::DuplicateHandler(msg_type));
        }
        self.handlers.insert(msg_type, Arc::new(handler));
        Ok(self)
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            handlers: self.handlers,
        }
    }
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Echoes the ping id.
pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    async fn handle(&self, _session: &Session, frame: Frame) -> Result<Frame> {
        let request = PingRequest::from_frame(&frame)?;
        PingResponse { id: request.id }.to_frame()
    }
}

/// Returns the session's identity.
pub struct WhoAmIHandler;

#[async_trait]
impl Handler for WhoAmIHandler {
    async fn handle(&self, session: &Session, frame: Frame) -> Result<Frame> {
        WhoAmIRequest::from_frame(&frame)?;
        WhoAmIResponse::from(&session.identity).to_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            identity: Identity::person("a@x.com", "A"),
            peer_addr: "127.0.0.1:5000".parse().unwrap(),
        }
    }

    struct Constant(u32);

    #[async_trait]
    impl Handler for Constant {
        async fn handle(&self, _session: &Session, _frame: Frame) -> Result<Frame> {
            Ok(Frame::new(self.0, bytes::Bytes::new()))
        }
    }

    #[tokio::test]
    async fn test_ping_echo() {
        let dispatcher = Dispatcher::standard();
        let frame = PingRequest { id: 1 }.to_frame().unwrap();
        let response = dispatcher.dispatch(&session(), frame).await.unwrap();
        assert_eq!(PingResponse::from_frame(&response).unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_who_am_i() {
        let dispatcher = Dispatcher::standard();
        let frame = WhoAmIRequest {}.to_frame().unwrap();
        let response = dispatcher.dispatch(&session(), frame).await.unwrap();
        let identity = WhoAmIResponse::from_frame(&response).unwrap();
        assert_eq!(identity.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_unknown_tag() {
        let dispatcher = Dispatcher::standard();
        let err = dispatcher
            .dispatch(&session(), Frame::new(99, bytes::Bytes::new()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RpcError::Protocol(ProtocolError::UnknownMessageType(99))
        ));
    }

    #[tokio::test]
    async fn test_custom_handler() {
        let dispatcher = Dispatcher::standard_builder()
            .register(10, Constant(10))
            .unwrap()
            .build();
        assert!(dispatcher.handles(10));
        let response = dispatcher
            .dispatch(&session(), Frame::new(10, bytes::Bytes::new()))
            .await
            .unwrap();
        assert_eq!(response.msg_type, 10);
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let err = Dispatcher::standard_builder()
            .register(tags::PING, Constant(0))
            .unwrap_err();
        assert!(matches!(err, RpcError::DuplicateHandler(tags::PING)));
    }

    #[test]
    fn test_empty_builder() {
        let dispatcher = Dispatcher::builder().build();
        assert!(!dispatcher.handles(tags::PING));
        assert_eq!(format!("{:?}", dispatcher), "Dispatcher { tags: [] }");
    }
}
