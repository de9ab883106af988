//! Connection Manager
//!
//! Drives one logical connection to the iTick stream through
//! connect → authenticate → subscribe → stream → reconnect.
//!
//! All state lives in a single actor task. Caller commands, session signals,
//! open results, reconnect timers and heartbeat ticks are funnelled into it
//! and handled one at a time, so a reconnect can never interleave with a
//! half-finished subscribe. [`ConnectionManager`] is the cloneable-by-`Arc`
//! handle that talks to the actor.
//!
//! # State Machine
//!
//! ```text
//!  Disconnected ──connect()/timer──► Connecting ──opened──► Authenticating
//!       ▲                                │                     │      │
//!       │◄───────── open failed ─────────┘                auth ok  auth failed
//!       │                                                      │      │
//!       │◄──────────── closed / error / timeout ──── Ready ◄───┘      │
//!       │◄────────────────────────────────────────────────────────────┘
//!
//!  any state ──shutdown()──► Closed
//! ```
//!
//! Decoded data events are dispatched inline on the actor task, so handlers
//! for one kind see events in arrival order. Handlers should be quick; a slow
//! handler delays every later frame.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{Connector, SessionLink, TransportError};
use crate::application::services::dispatch::DispatchRegistry;
use crate::domain::market_data::MarketEvent;
use crate::domain::subscription::{DataKind, SubscriptionError, SubscriptionRequest, SubscriptionSet};
use crate::infrastructure::metrics;

use super::auth::{AccessToken, AuthError};
use super::codec::{CodecError, JsonCodec};
use super::heartbeat::{HeartbeatConfig, HeartbeatError, HeartbeatEvent, HeartbeatScheduler};
use super::messages::{ControlAction, ControlResponse, Inbound, WireMessage};
use super::reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
use super::transport::{CloseReason, SessionSignal, TransportSession};

/// Production stream endpoint.
pub const DEFAULT_WS_URL: &str = "wss://api.itick.org/fws";

// =============================================================================
// Error Type
// =============================================================================

/// Errors surfaced by the connection manager.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Invalid or rejected subscription.
    #[error("subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    /// Authentication problem.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Transport problem.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Codec problem.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The manager has been shut down.
    #[error("connection manager is closed")]
    Closed,
}

// =============================================================================
// State and Status
// =============================================================================

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No session; a reconnect may be pending.
    #[default]
    Disconnected,
    /// Opening a session.
    Connecting,
    /// Session open, auth sent, awaiting the answer.
    Authenticating,
    /// Authenticated and streaming.
    Ready,
    /// Shut down by the caller; terminal.
    Closed,
}

impl ConnectionState {
    /// Lowercase state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Ready => "ready",
            Self::Closed => "closed",
        }
    }

    const fn gauge_value(self) -> f64 {
        match self {
            Self::Disconnected => 0.0,
            Self::Connecting => 1.0,
            Self::Authenticating => 2.0,
            Self::Ready => 3.0,
            Self::Closed => 4.0,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Current state.
    pub state: ConnectionState,
    /// Accumulated symbols, first-seen order.
    pub symbols: Vec<String>,
    /// Accumulated kinds, first-seen order.
    pub kinds: Vec<DataKind>,
    /// Most recent failure since the last successful authentication.
    pub last_error: Option<String>,
    /// Reconnect attempts since the last successful authentication.
    pub reconnect_attempts: u32,
}

// =============================================================================
// Configuration
// =============================================================================

/// Connection manager configuration.
#[derive(Debug, Clone)]
pub struct StreamClientConfig {
    /// Stream endpoint.
    pub url: String,
    /// Access token sent with `auth`.
    pub token: AccessToken,
    /// Heartbeat settings.
    pub heartbeat: HeartbeatConfig,
    /// Reconnect schedule.
    pub reconnect: ReconnectConfig,
    /// Kinds callers may subscribe to.
    pub allowed_kinds: Vec<DataKind>,
}

impl StreamClientConfig {
    /// Defaults for everything but the token.
    #[must_use]
    pub fn new(token: AccessToken) -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            token,
            heartbeat: HeartbeatConfig::default(),
            reconnect: ReconnectConfig::default(),
            allowed_kinds: DataKind::all().to_vec(),
        }
    }

    /// Override the endpoint.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Override heartbeat settings.
    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Override the reconnect schedule.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Narrow the kinds callers may subscribe to.
    #[must_use]
    pub fn with_allowed_kinds(mut self, kinds: &[DataKind]) -> Self {
        self.allowed_kinds = kinds.to_vec();
        self
    }
}

// =============================================================================
// Handle
// =============================================================================

enum Command {
    Connect,
    Subscribe(SubscriptionRequest),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the connection actor.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use itick_stream_client::{
///     AccessToken, ConnectionManager, DataKind, DispatchRegistry, Quote, StreamClientConfig,
///     WebSocketConnector,
/// };
///
/// async fn example() -> Result<(), Box<dyn std::error::Error>> {
///     let registry = Arc::new(DispatchRegistry::new());
///     registry.register(|quote: &Quote| {
///         tracing::info!(symbol = %quote.symbol, price = quote.last_price, "quote");
///         Ok(())
///     });
///
///     let config = StreamClientConfig::new(AccessToken::new("token")?);
///     let manager =
///         ConnectionManager::spawn(config, Arc::new(WebSocketConnector::default()), registry);
///
///     manager.subscribe(["AAPL$US"], &[DataKind::Quote])?;
///     manager.connect()?;
///
///     tokio::signal::ctrl_c().await?;
///     manager.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    status: Arc<RwLock<ConnectionStatus>>,
    registry: Arc<DispatchRegistry>,
    allowed_kinds: Vec<DataKind>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("status", &*self.status.read())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Start the connection actor. Nothing is opened until [`connect`](Self::connect).
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn(
        config: StreamClientConfig,
        connector: Arc<dyn Connector>,
        registry: Arc<DispatchRegistry>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let status = Arc::new(RwLock::new(ConnectionStatus::default()));
        let allowed_kinds = config.allowed_kinds.clone();

        let actor = ConnectionActor::new(
            config,
            connector,
            Arc::clone(&registry),
            Arc::clone(&status),
            command_rx,
        );
        let task = tokio::spawn(actor.run());

        Self {
            commands,
            status,
            registry,
            allowed_kinds,
            task: Mutex::new(Some(task)),
        }
    }

    /// Request a connection. A no-op while already connecting or connected.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] after shutdown.
    pub fn connect(&self) -> Result<(), ClientError> {
        self.send(Command::Connect)
    }

    /// Add symbols and kinds to the subscription.
    ///
    /// Sent immediately when ready; otherwise recorded and replayed after the
    /// next successful authentication.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is empty, names a kind outside the
    /// allowed set, or the manager is shut down.
    pub fn subscribe<I, S>(&self, symbols: I, kinds: &[DataKind]) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let request = SubscriptionRequest::new(symbols, kinds)?;
        self.submit(request)
    }

    /// Subscribe using the comma-separated wire forms, e.g.
    /// `subscribe_csv("AAPL$US,700$HK", "quote,depth")`.
    ///
    /// # Errors
    ///
    /// Same as [`subscribe`](Self::subscribe), plus unknown kind tags.
    pub fn subscribe_csv(&self, symbols: &str, kinds: &str) -> Result<(), ClientError> {
        let request = SubscriptionRequest::parse(symbols, kinds)?;
        self.submit(request)
    }

    fn submit(&self, request: SubscriptionRequest) -> Result<(), ClientError> {
        request.validate(&self.allowed_kinds)?;
        self.send(Command::Subscribe(request))
    }

    /// Shut down: stop the heartbeat, close the session, cancel any pending
    /// reconnect, and wait for the actor to finish. Idempotent.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }

        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.status.read().state
    }

    /// Snapshot of state, subscriptions and last error.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status.read().clone()
    }

    /// The registry events are dispatched to.
    #[must_use]
    pub const fn registry(&self) -> &Arc<DispatchRegistry> {
        &self.registry
    }

    fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands.send(command).map_err(|_| ClientError::Closed)
    }
}

// =============================================================================
// Actor
// =============================================================================

enum Internal {
    Opened { attempt: u64, link: SessionLink },
    OpenFailed { attempt: u64, error: TransportError },
    ReconnectDue { ticket: u64 },
}

struct ConnectionActor {
    config: StreamClientConfig,
    connector: Arc<dyn Connector>,
    registry: Arc<DispatchRegistry>,
    codec: JsonCodec,
    status: Arc<RwLock<ConnectionStatus>>,

    state: ConnectionState,
    subscriptions: SubscriptionSet,
    session: Option<TransportSession>,
    last_error: Option<String>,

    attempt: u64,
    pending_open: Option<CancellationToken>,
    reconnect: ReconnectPolicy,
    reconnect_ticket: u64,
    pending_reconnect: Option<(u64, CancellationToken)>,
    heartbeat: HeartbeatScheduler,

    commands: mpsc::UnboundedReceiver<Command>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    signal_tx: mpsc::UnboundedSender<SessionSignal>,
    signal_rx: mpsc::UnboundedReceiver<SessionSignal>,
}

impl ConnectionActor {
    fn new(
        config: StreamClientConfig,
        connector: Arc<dyn Connector>,
        registry: Arc<DispatchRegistry>,
        status: Arc<RwLock<ConnectionStatus>>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let heartbeat = HeartbeatScheduler::new(config.heartbeat.clone());
        let reconnect = ReconnectPolicy::new(config.reconnect.clone());

        Self {
            config,
            connector,
            registry,
            codec: JsonCodec::new(),
            status,
            state: ConnectionState::Disconnected,
            subscriptions: SubscriptionSet::new(),
            session: None,
            last_error: None,
            attempt: 0,
            pending_open: None,
            reconnect,
            reconnect_ticket: 0,
            pending_reconnect: None,
            heartbeat,
            commands,
            internal_tx,
            internal_rx,
            signal_tx,
            signal_rx,
        }
    }

    async fn run(mut self) {
        metrics::set_connection_state(self.state.gauge_value());

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Connect) => self.on_connect_requested(),
                    Some(Command::Subscribe(request)) => self.on_subscribe(&request),
                    Some(Command::Shutdown(ack)) => {
                        self.on_shutdown();
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        self.on_shutdown();
                        break;
                    }
                },
                Some(internal) = self.internal_rx.recv() => self.on_internal(internal),
                Some(signal) = self.signal_rx.recv() => self.on_session_signal(signal),
                event = self.heartbeat.next_event() => self.on_heartbeat(event),
            }
        }
    }

    // -------------------------------------------------------------------------
    // Caller commands
    // -------------------------------------------------------------------------

    fn on_connect_requested(&mut self) {
        if self.state != ConnectionState::Disconnected {
            tracing::debug!(state = %self.state, "Connect ignored, already active");
            return;
        }

        self.cancel_pending_reconnect();
        self.reconnect.reset();
        self.start_connect();
    }

    fn on_subscribe(&mut self, request: &SubscriptionRequest) {
        let changed = self.subscriptions.merge(request);
        self.publish_status();

        if self.state == ConnectionState::Ready {
            tracing::info!(
                symbols = %request.symbols().join(","),
                kinds = ?request.kinds(),
                "Subscribing"
            );
            self.send_frame(&WireMessage::subscribe_request(request));
        } else {
            tracing::debug!(
                state = %self.state,
                changed,
                "Subscription recorded for replay after authentication"
            );
        }
    }

    fn on_shutdown(&mut self) {
        if let Some(cancel) = self.pending_open.take() {
            cancel.cancel();
        }
        self.cancel_pending_reconnect();
        self.heartbeat.stop();
        if let Some(session) = self.session.take() {
            session.close();
        }
        self.set_state(ConnectionState::Closed);
        tracing::info!("Connection manager shut down");
    }

    // -------------------------------------------------------------------------
    // Opening and reconnecting
    // -------------------------------------------------------------------------

    fn start_connect(&mut self) {
        self.attempt += 1;
        let attempt = self.attempt;
        let url = self.config.url.clone();
        let connector = Arc::clone(&self.connector);
        let internal_tx = self.internal_tx.clone();
        let cancel = CancellationToken::new();
        self.pending_open = Some(cancel.clone());

        self.set_state(ConnectionState::Connecting);
        tracing::info!(url = %url, attempt, "Connecting to iTick stream");

        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                result = connector.open(&url) => {
                    let message = match result {
                        Ok(link) => Internal::Opened { attempt, link },
                        Err(error) => Internal::OpenFailed { attempt, error },
                    };
                    let _ = internal_tx.send(message);
                }
            }
        });
    }

    fn schedule_reconnect(&mut self) {
        let Some(delay) = self.reconnect.next_delay() else {
            let error = ReconnectError::MaxAttemptsExceeded(self.reconnect.attempt_count());
            tracing::error!(error = %error, "Reconnect attempts exhausted, staying disconnected");
            self.last_error = Some(error.to_string());
            self.publish_status();
            return;
        };

        self.cancel_pending_reconnect();
        self.reconnect_ticket += 1;
        let ticket = self.reconnect_ticket;
        let cancel = CancellationToken::new();
        self.pending_reconnect = Some((ticket, cancel.clone()));

        metrics::record_reconnect();
        tracing::info!(
            attempt = self.reconnect.attempt_count(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Scheduling reconnect"
        );
        self.publish_status();

        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = internal_tx.send(Internal::ReconnectDue { ticket });
                }
            }
        });
    }

    fn cancel_pending_reconnect(&mut self) {
        if let Some((_, cancel)) = self.pending_reconnect.take() {
            cancel.cancel();
        }
    }

    fn on_internal(&mut self, internal: Internal) {
        match internal {
            Internal::Opened { attempt, link } => {
                if attempt != self.attempt || self.state != ConnectionState::Connecting {
                    tracing::debug!(attempt, "Discarding stale session");
                    return;
                }
                self.pending_open = None;

                let session = TransportSession::spawn(attempt, link, self.signal_tx.clone());
                self.session = Some(session);
                self.set_state(ConnectionState::Authenticating);
                tracing::info!("Session opened, authenticating");

                let auth = self.config.token.to_auth_message();
                if !self.send_frame(&auth) {
                    self.on_session_lost();
                }
            }
            Internal::OpenFailed { attempt, error } => {
                if attempt != self.attempt || self.state != ConnectionState::Connecting {
                    return;
                }
                self.pending_open = None;

                tracing::warn!(error = %error, "Failed to open iTick stream");
                self.last_error = Some(error.to_string());
                self.set_state(ConnectionState::Disconnected);
                self.schedule_reconnect();
            }
            Internal::ReconnectDue { ticket } => {
                let due = matches!(self.pending_reconnect, Some((pending, _)) if pending == ticket);
                if !due || self.state != ConnectionState::Disconnected {
                    return;
                }
                self.pending_reconnect = None;
                self.start_connect();
            }
        }
    }

    // -------------------------------------------------------------------------
    // Session signals
    // -------------------------------------------------------------------------

    fn is_current_session(&self, id: u64) -> bool {
        self.session.as_ref().is_some_and(|session| session.id() == id)
    }

    fn on_session_signal(&mut self, signal: SessionSignal) {
        match signal {
            SessionSignal::Frame { session, text } => {
                if !self.is_current_session(session) {
                    tracing::trace!(session, "Dropping frame from stale session");
                    return;
                }
                self.on_frame(&text);
            }
            SessionSignal::Closed { session, reason } => {
                if !self.is_current_session(session) {
                    return;
                }
                match &reason {
                    CloseReason::Error(e) => {
                        tracing::warn!(error = %e, state = %self.state, "Session failed");
                    }
                    CloseReason::Remote | CloseReason::Local => {
                        tracing::info!(reason = %reason, state = %self.state, "Session closed");
                    }
                }
                self.last_error = Some(reason.to_string());
                self.on_session_lost();
            }
        }
    }

    fn on_frame(&mut self, text: &str) {
        metrics::record_frame_received();
        self.heartbeat.state().record_pong();
        tracing::trace!(frame = %text, "Frame received");

        match self.codec.decode(text) {
            Ok(Inbound::Control(response)) => self.on_control(&response),
            Ok(Inbound::Event(event)) => self.dispatch(&event),
            Err(e) => {
                metrics::record_decode_error();
                tracing::warn!(error = %e, "Discarding undecodable frame");
            }
        }
    }

    fn on_control(&mut self, response: &ControlResponse) {
        match response.res_ac {
            ControlAction::Auth => self.on_auth_response(response),
            ControlAction::Subscribe => {
                if response.is_success() {
                    tracing::info!("Subscription acknowledged");
                } else {
                    let error = SubscriptionError::Rejected {
                        code: response.code,
                        message: response.message().to_string(),
                    };
                    tracing::warn!(error = %error, "Subscription failed, kept for replay");
                    self.last_error = Some(error.to_string());
                    self.publish_status();
                }
            }
            ControlAction::Pong => {
                tracing::debug!(code = response.code, "Heartbeat acknowledged");
            }
            ControlAction::Unknown => {
                tracing::debug!(code = response.code, "Ignoring unknown control response");
            }
        }
    }

    fn on_auth_response(&mut self, response: &ControlResponse) {
        if self.state != ConnectionState::Authenticating {
            tracing::warn!(state = %self.state, "Unexpected auth response ignored");
            return;
        }

        if !response.is_success() {
            let error = AuthError::from(response);
            metrics::record_auth_failure();
            tracing::error!(error = %error, "Authentication failed");
            self.last_error = Some(error.to_string());
            self.on_session_lost();
            return;
        }

        tracing::info!("Authenticated");
        self.reconnect.reset();
        self.last_error = None;
        self.set_state(ConnectionState::Ready);
        self.heartbeat.start();

        if !self.subscriptions.is_empty() {
            tracing::info!(
                symbols = %self.subscriptions.symbols_param(),
                kinds = %self.subscriptions.kinds_param(),
                "Replaying subscriptions"
            );
            let replay = WireMessage::subscribe(&self.subscriptions);
            self.send_frame(&replay);
        }
    }

    fn dispatch(&self, event: &MarketEvent) {
        let outcome = self.registry.notify(event);
        metrics::record_dispatch(event.kind(), outcome.delivered, outcome.failed);
    }

    /// Tear down the current session and schedule a reconnect.
    fn on_session_lost(&mut self) {
        self.heartbeat.stop();
        if let Some(session) = self.session.take() {
            session.close();
        }
        self.set_state(ConnectionState::Disconnected);
        self.schedule_reconnect();
    }

    // -------------------------------------------------------------------------
    // Heartbeat
    // -------------------------------------------------------------------------

    fn on_heartbeat(&mut self, event: HeartbeatEvent) {
        if self.state != ConnectionState::Ready {
            tracing::debug!(state = %self.state, ?event, "Heartbeat event outside ready state");
            self.heartbeat.stop();
            return;
        }

        match event {
            HeartbeatEvent::SendPing => {
                let ping = WireMessage::ping(chrono::Utc::now().timestamp_millis());
                if self.send_frame(&ping) {
                    self.heartbeat.state().mark_ping_sent();
                }
            }
            HeartbeatEvent::Timeout => {
                let timeout = self.heartbeat.config().pong_timeout.unwrap_or_default();
                let error = HeartbeatError::Timeout(timeout);
                tracing::warn!(error = %error, "Session silent, reconnecting");
                self.last_error = Some(error.to_string());
                self.on_session_lost();
            }
        }
    }

    // -------------------------------------------------------------------------
    // Output
    // -------------------------------------------------------------------------

    /// Send one control frame. Refused, with a warning, when no session is open.
    fn send_frame(&self, message: &WireMessage) -> bool {
        let action = message.ac;
        let Some(session) = self.session.as_ref().filter(|session| session.is_open()) else {
            tracing::warn!(action = action.as_str(), "Send refused, transport not open");
            return false;
        };

        let text = match self.codec.encode(message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(action = action.as_str(), error = %e, "Failed to encode frame");
                return false;
            }
        };

        match session.send(text) {
            Ok(()) => {
                metrics::record_frame_sent(action);
                tracing::debug!(action = action.as_str(), "Frame sent");
                true
            }
            Err(e) => {
                tracing::warn!(action = action.as_str(), error = %e, "Send refused");
                false
            }
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::info!(from = %self.state, to = %next, "Connection state changed");
            self.state = next;
            metrics::set_connection_state(next.gauge_value());
        }
        self.publish_status();
    }

    fn publish_status(&self) {
        let mut status = self.status.write();
        status.state = self.state;
        status.symbols = self.subscriptions.symbols().to_vec();
        status.kinds = self.subscriptions.kinds().to_vec();
        status.last_error.clone_from(&self.last_error);
        status.reconnect_attempts = self.reconnect.attempt_count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::Authenticating.to_string(), "authenticating");
        assert_eq!(ConnectionState::Ready.as_str(), "ready");
    }

    #[test]
    fn config_defaults() {
        let config = StreamClientConfig::new(AccessToken::new("t").unwrap());
        assert_eq!(config.url, DEFAULT_WS_URL);
        assert_eq!(config.allowed_kinds, DataKind::all().to_vec());
        assert!(config.heartbeat.pong_timeout.is_none());
        assert_eq!(config.reconnect.max_attempts, 0);
    }

    #[tokio::test]
    async fn subscribe_validates_before_queueing() {
        struct NeverConnects;

        #[async_trait::async_trait]
        impl Connector for NeverConnects {
            async fn open(&self, _url: &str) -> Result<SessionLink, TransportError> {
                Err(TransportError::Connect("offline".to_string()))
            }
        }

        let config = StreamClientConfig::new(AccessToken::new("t").unwrap())
            .with_allowed_kinds(&[DataKind::Quote]);
        let manager = ConnectionManager::spawn(
            config,
            Arc::new(NeverConnects),
            Arc::new(DispatchRegistry::new()),
        );

        assert!(matches!(
            manager.subscribe(["AAPL"], &[DataKind::Depth]),
            Err(ClientError::Subscription(SubscriptionError::UnsupportedKind(_)))
        ));
        assert!(matches!(
            manager.subscribe_csv("AAPL", "quote,news"),
            Err(ClientError::Subscription(SubscriptionError::UnsupportedKind(_)))
        ));
        assert!(matches!(
            manager.subscribe(Vec::<String>::new(), &[DataKind::Quote]),
            Err(ClientError::Subscription(SubscriptionError::NoSymbols))
        ));

        manager.subscribe(["AAPL", "AAPL"], &[DataKind::Quote]).unwrap();
        manager.shutdown().await;

        let status = manager.status();
        assert_eq!(status.state, ConnectionState::Closed);
        assert_eq!(status.symbols, vec!["AAPL".to_string()]);
        assert!(matches!(manager.connect(), Err(ClientError::Closed)));
    }
}
