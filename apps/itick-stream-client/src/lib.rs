#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! iTick Stream Client - Realtime Market Data
//!
//! Maintains one persistent WebSocket session to the iTick quote service,
//! authenticates with an access token, subscribes to instruments and data
//! kinds, and fans decoded events out to locally registered handlers.
//! Transport errors, rejected authentication and idle disconnects all end
//! in a scheduled reconnect that replays the accumulated subscriptions.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Market data events, subscription kinds and the accumulated
//!   subscription union
//!
//! - **Application**: Port definitions and services
//!   - `ports`: the `Connector` interface for opening physical sessions
//!   - `services::dispatch`: typed fan-out of events to handlers
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `itick`: wire messages, codec, transport, heartbeat, reconnect, and the
//!     connection manager state machine
//!   - `config`: environment-driven settings
//!   - `metrics` / `telemetry`: Prometheus metrics and tracing setup
//!
//! # Data Flow
//!
//! ```text
//!                    ┌──────────────┐  frames   ┌────────────┐  events  ┌──────────┐
//! iTick WS  ◄──────► │  Transport   │ ────────► │ Connection │ ───────► │ Dispatch │ ──► handlers
//!                    │   Session    │ ◄──────── │  Manager   │          │ Registry │
//!                    └──────────────┘  auth/sub └────────────┘          └──────────┘
//!                                       /ping        ▲
//!                                                    │ ticks
//!                                              ┌───────────┐
//!                                              │ Heartbeat │
//!                                              └───────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Market data and subscription types with no I/O dependencies.
pub mod domain;

/// Application layer - Ports and services.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market_data::{Candle, CandleUpdate, Depth, DepthLevel, MarketEvent, Quote, Trade};
pub use domain::subscription::{DataKind, SubscriptionError, SubscriptionRequest, SubscriptionSet};

// Application
pub use application::ports::{Connector, FrameSink, FrameStream, SessionLink, TransportError};
pub use application::services::dispatch::{
    DispatchOutcome, DispatchRegistry, HandlerId, HandlerResult, MarketEventPayload,
};

// Wire types
pub use infrastructure::itick::messages::{Action, ControlAction, ControlResponse, Inbound, WireMessage};

// Connection manager
pub use infrastructure::itick::client::{
    ClientError, ConnectionManager, ConnectionState, ConnectionStatus, StreamClientConfig,
};
pub use infrastructure::itick::{
    AccessToken, AuthError, CloseReason, CodecError, HeartbeatConfig, JsonCodec, ReconnectConfig,
    ReconnectPolicy, WebSocketConnector,
};

// Infrastructure config
pub use infrastructure::config::{ClientSettings, ConfigError};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
