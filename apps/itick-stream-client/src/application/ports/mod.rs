//! Port Interfaces
//!
//! Defines the interface to the physical transport following the Hexagonal
//! Architecture pattern. The connection manager only ever talks to a
//! [`Connector`]; the WebSocket adapter lives in the infrastructure layer and
//! tests substitute an in-memory implementation.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Connector`: opens one physical session and hands back its frame sink
//!   and frame stream

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, Stream};

/// Errors raised by a physical transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Opening the session failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Opening the session did not finish in time.
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// No session is open.
    #[error("transport is not open")]
    NotOpen,
}

/// Outbound half of a session: accepts text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Inbound half of a session: yields text frames until the session ends.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// Both halves of a freshly opened session.
pub struct SessionLink {
    /// Outbound frames.
    pub sink: FrameSink,
    /// Inbound frames.
    pub stream: FrameStream,
}

impl SessionLink {
    /// Box a sink and stream pair into a link.
    pub fn new<W, R>(sink: W, stream: R) -> Self
    where
        W: Sink<String, Error = TransportError> + Send + 'static,
        R: Stream<Item = Result<String, TransportError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

impl fmt::Debug for SessionLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLink").finish_non_exhaustive()
    }
}

/// Opens physical sessions to the quote service.
///
/// Implementations report failures and never retry; retry policy belongs to
/// the connection manager.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open one session against `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the session cannot be established.
    async fn open(&self, url: &str) -> Result<SessionLink, TransportError>;
}
