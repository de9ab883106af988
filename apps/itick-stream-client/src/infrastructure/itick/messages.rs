//! iTick WebSocket Message Types
//!
//! Wire format types for the control half of the iTick stream protocol. Data
//! event payloads live in [`crate::domain::market_data`]; this module holds the
//! envelopes around them.
//!
//! # Message Types
//!
//! ## Outbound (client → server)
//! - `auth`: present the access token
//! - `subscribe`: request symbols and data kinds
//! - `ping`: keep-alive carrying the send time
//!
//! ## Inbound (server → client)
//! - Control responses keyed by `resAc` (`auth`, `subscribe`, `pong`)
//! - Data frames wrapping a `data` object (quote, tick, depth, candle)

use serde::{Deserialize, Serialize};

use crate::domain::market_data::MarketEvent;
use crate::domain::subscription::{DataKind, SubscriptionRequest, SubscriptionSet};

/// Response code the server uses for success.
pub const SUCCESS_CODE: i64 = 1;

// =============================================================================
// Outbound Messages
// =============================================================================

/// Outbound action discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Authenticate with an access token.
    Auth,
    /// Subscribe to symbols and kinds.
    Subscribe,
    /// Keep-alive ping.
    Ping,
}

impl Action {
    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Subscribe => "subscribe",
            Self::Ping => "ping",
        }
    }
}

/// Outbound control envelope.
///
/// # Wire Format (JSON)
/// ```json
/// {"ac":"auth","params":"<token>"}
/// {"ac":"subscribe","params":"AAPL$US,700$HK","types":"quote,depth"}
/// {"ac":"ping","params":"1718000000000"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Action to perform.
    pub ac: Action,

    /// Action payload: token, comma-joined symbols, or send time.
    pub params: String,

    /// Comma-joined kinds, only for `subscribe`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<String>,
}

impl WireMessage {
    /// Build an auth message.
    #[must_use]
    pub fn auth(token: impl Into<String>) -> Self {
        Self {
            ac: Action::Auth,
            params: token.into(),
            types: None,
        }
    }

    /// Build a subscribe message covering a whole subscription set.
    #[must_use]
    pub fn subscribe(set: &SubscriptionSet) -> Self {
        Self {
            ac: Action::Subscribe,
            params: set.symbols_param(),
            types: Some(set.kinds_param()),
        }
    }

    /// Build a subscribe message for a single request.
    #[must_use]
    pub fn subscribe_request(request: &SubscriptionRequest) -> Self {
        Self {
            ac: Action::Subscribe,
            params: request.symbols().join(","),
            types: Some(
                request
                    .kinds()
                    .iter()
                    .map(DataKind::as_str)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        }
    }

    /// Build a heartbeat ping carrying the send time in epoch millis.
    #[must_use]
    pub fn ping(sent_at_millis: i64) -> Self {
        Self {
            ac: Action::Ping,
            params: sent_at_millis.to_string(),
            types: None,
        }
    }
}

// =============================================================================
// Inbound Messages
// =============================================================================

/// Action a control response acknowledges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    /// Acknowledges `auth`.
    Auth,
    /// Acknowledges `subscribe`.
    Subscribe,
    /// Acknowledges `ping`.
    Pong,
    /// Any action this client does not know.
    #[serde(other)]
    Unknown,
}

impl ControlAction {
    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Subscribe => "subscribe",
            Self::Pong => "pong",
            Self::Unknown => "unknown",
        }
    }
}

/// Inbound control response.
///
/// # Wire Format (JSON)
/// ```json
/// {"resAc":"auth","code":1}
/// {"resAc":"subscribe","code":0,"msg":"invalid symbol"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    /// Acknowledged action.
    #[serde(rename = "resAc")]
    pub res_ac: ControlAction,

    /// Result code, `1` on success.
    #[serde(default)]
    pub code: i64,

    /// Error text, usually present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl ControlResponse {
    /// Build a response with no message text.
    #[must_use]
    pub const fn new(res_ac: ControlAction, code: i64) -> Self {
        Self {
            res_ac,
            code,
            msg: None,
        }
    }

    /// Whether the server reported success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Error text, or an empty string.
    #[must_use]
    pub fn message(&self) -> &str {
        self.msg.as_deref().unwrap_or_default()
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Acknowledgement of a control action.
    Control(ControlResponse),
    /// Market data event.
    Event(MarketEvent),
}
