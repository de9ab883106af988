//! iTick WebSocket Adapters
//!
//! Implements the streaming client for the iTick quote service:
//!
//! - **Messages / Codec**: JSON envelopes for control actions and data events
//! - **Transport**: one physical WebSocket session at a time
//! - **Heartbeat / Reconnect**: keep-alive pings and retry policy
//! - **Client**: the connection manager state machine

pub mod auth;
pub mod client;
pub mod codec;
pub mod heartbeat;
pub mod messages;
pub mod reconnect;
pub mod transport;

pub use auth::{AccessToken, AuthError};
pub use client::{
    ClientError, ConnectionManager, ConnectionState, ConnectionStatus, StreamClientConfig,
};
pub use codec::{CodecError, JsonCodec};
pub use heartbeat::{
    HeartbeatConfig, HeartbeatError, HeartbeatEvent, HeartbeatScheduler, HeartbeatState,
};
pub use messages::{Action, ControlAction, ControlResponse, Inbound, WireMessage};
pub use reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
pub use transport::{CloseReason, SessionSignal, TransportSession, WebSocketConnector};
