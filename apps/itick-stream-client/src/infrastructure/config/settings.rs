//! Client Configuration Settings
//!
//! Configuration types for the stream client, loaded from environment variables.
//! Malformed numeric values fall back to their defaults; a missing token or an
//! unknown kind is an error.

use std::time::Duration;

use crate::domain::subscription::{DataKind, SubscriptionRequest};
use crate::infrastructure::itick::auth::AccessToken;
use crate::infrastructure::itick::client::{DEFAULT_WS_URL, StreamClientConfig};
use crate::infrastructure::itick::heartbeat::{HeartbeatConfig, MAX_HEARTBEAT_INTERVAL};
use crate::infrastructure::itick::reconnect::ReconnectConfig;

/// WebSocket connection settings.
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    /// Heartbeat ping interval.
    pub heartbeat_interval: Duration,
    /// Silence before the session is dropped (`None` = disabled).
    pub pong_timeout: Option<Duration>,
    /// Bound on a single open attempt.
    pub connect_timeout: Duration,
    /// Delay before the first reconnection attempt.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier (1.0 = fixed delay).
    pub reconnect_delay_multiplier: f64,
    /// Reconnection jitter fraction.
    pub reconnect_jitter: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(15),
            pong_timeout: None,
            connect_timeout: Duration::from_secs(10),
            reconnect_delay_initial: Duration::from_millis(5000),
            reconnect_delay_max: Duration::from_millis(5000),
            reconnect_delay_multiplier: 1.0,
            reconnect_jitter: 0.0,
            max_reconnect_attempts: 0, // Unlimited
        }
    }
}

impl WebSocketSettings {
    /// Heartbeat settings for the connection manager.
    #[must_use]
    pub const fn heartbeat_config(&self) -> HeartbeatConfig {
        HeartbeatConfig::new(self.heartbeat_interval, self.pong_timeout)
    }

    /// Reconnect schedule for the connection manager.
    ///
    /// The cap is never below the initial delay.
    #[must_use]
    pub fn reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig::new(
            self.reconnect_delay_initial,
            self.reconnect_delay_max.max(self.reconnect_delay_initial),
            self.reconnect_delay_multiplier,
            self.reconnect_jitter,
            self.max_reconnect_attempts,
        )
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Stream endpoint.
    pub url: String,
    /// Access token.
    pub token: AccessToken,
    /// WebSocket connection settings.
    pub websocket: WebSocketSettings,
    /// Kinds callers may subscribe to.
    pub allowed_kinds: Vec<DataKind>,
    /// Subscription issued at startup by the binary.
    pub initial_subscription: Option<SubscriptionRequest>,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

impl ClientSettings {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `ITICK_TOKEN` is missing or empty, or if a kind list
    /// or the initial subscription cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_token =
            lookup("ITICK_TOKEN").ok_or_else(|| ConfigError::MissingEnvVar("ITICK_TOKEN".to_string()))?;
        let token =
            AccessToken::new(raw_token).map_err(|_| ConfigError::EmptyValue("ITICK_TOKEN".to_string()))?;

        let url = lookup("ITICK_WS_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_WS_URL.to_string());

        let defaults = WebSocketSettings::default();
        let pong_timeout_secs = parse_u64(&lookup, "ITICK_PONG_TIMEOUT_SECS", 0);
        let websocket = WebSocketSettings {
            heartbeat_interval: parse_duration_secs(
                &lookup,
                "ITICK_HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval,
            )
            .min(MAX_HEARTBEAT_INTERVAL),
            pong_timeout: (pong_timeout_secs > 0).then_some(Duration::from_secs(pong_timeout_secs)),
            connect_timeout: parse_duration_secs(
                &lookup,
                "ITICK_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout,
            ),
            reconnect_delay_initial: parse_duration_millis(
                &lookup,
                "ITICK_RECONNECT_DELAY_MS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_duration_millis(
                &lookup,
                "ITICK_RECONNECT_DELAY_MAX_MS",
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_f64(
                &lookup,
                "ITICK_RECONNECT_MULTIPLIER",
                defaults.reconnect_delay_multiplier,
            ),
            reconnect_jitter: parse_fraction(
                &lookup,
                "ITICK_RECONNECT_JITTER",
                defaults.reconnect_jitter,
            ),
            max_reconnect_attempts: parse_u32(
                &lookup,
                "ITICK_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
        };

        let allowed_kinds = match lookup("ITICK_ALLOWED_KINDS").filter(|v| !v.trim().is_empty()) {
            Some(list) => {
                let kinds = DataKind::parse_list(&list).map_err(|e| ConfigError::InvalidValue {
                    key: "ITICK_ALLOWED_KINDS".to_string(),
                    reason: e.to_string(),
                })?;
                if kinds.is_empty() {
                    return Err(ConfigError::EmptyValue("ITICK_ALLOWED_KINDS".to_string()));
                }
                kinds
            }
            None => DataKind::all().to_vec(),
        };

        let initial_subscription = match lookup("ITICK_SYMBOLS").filter(|v| !v.trim().is_empty()) {
            Some(symbols) => {
                let types = lookup("ITICK_TYPES")
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| DataKind::Quote.as_str().to_string());
                let request = SubscriptionRequest::parse(&symbols, &types).map_err(|e| {
                    ConfigError::InvalidValue {
                        key: "ITICK_TYPES".to_string(),
                        reason: e.to_string(),
                    }
                })?;
                request
                    .validate(&allowed_kinds)
                    .map_err(|e| ConfigError::InvalidValue {
                        key: "ITICK_TYPES".to_string(),
                        reason: e.to_string(),
                    })?;
                Some(request)
            }
            None => None,
        };

        Ok(Self {
            url,
            token,
            websocket,
            allowed_kinds,
            initial_subscription,
            metrics_port: parse_u16(&lookup, "ITICK_METRICS_PORT", 0),
        })
    }

    /// Connection manager configuration derived from these settings.
    #[must_use]
    pub fn stream_config(&self) -> StreamClientConfig {
        StreamClientConfig::new(self.token.clone())
            .with_url(self.url.clone())
            .with_heartbeat(self.websocket.heartbeat_config())
            .with_reconnect(self.websocket.reconnect_config())
            .with_allowed_kinds(&self.allowed_kinds)
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable could not be interpreted.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// What was wrong with it.
        reason: String,
    },
}

fn parse_u16<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u16) -> u16 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_u32<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u32) -> u32 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_u64<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u64) -> u64 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_f64<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: f64) -> f64 {
    lookup(key)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(default)
}

fn parse_fraction<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: f64) -> f64 {
    lookup(key)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| (0.0..=1.0).contains(v))
        .unwrap_or(default)
}

fn parse_duration_secs<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .map_or(default, Duration::from_millis)
}
