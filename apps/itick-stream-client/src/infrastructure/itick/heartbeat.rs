//! Heartbeat Scheduler
//!
//! While a session is authenticated, asks the connection manager to send a
//! `ping` every interval (15 seconds by default, first tick one interval after
//! start). The scheduler does no I/O itself: it emits [`HeartbeatEvent`]s and
//! the owner turns them into frames.
//!
//! An optional pong timeout turns a silent session into a
//! [`HeartbeatEvent::Timeout`]; it is off unless configured.

use std::future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default interval between pings.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Longest accepted interval between pings.
pub const MAX_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

const EVENT_BUFFER: usize = 8;

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval between ping messages.
    pub ping_interval: Duration,
    /// Silence after which the session is considered dead (`None` = never).
    pub pong_timeout: Option<Duration>,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_HEARTBEAT_INTERVAL,
            pong_timeout: None,
        }
    }
}

impl HeartbeatConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(ping_interval: Duration, pong_timeout: Option<Duration>) -> Self {
        Self {
            ping_interval,
            pong_timeout,
        }
    }
}

/// Events emitted by the heartbeat scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// Request to send a ping message.
    SendPing,
    /// Nothing heard within the pong timeout; the session should be dropped.
    Timeout,
}

/// Liveness bookkeeping shared between the scheduler task and its owner.
#[derive(Debug)]
pub struct HeartbeatState {
    last_pong: RwLock<Instant>,
    waiting_for_pong: AtomicBool,
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatState {
    /// Create new heartbeat state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_pong: RwLock::new(Instant::now()),
            waiting_for_pong: AtomicBool::new(false),
        }
    }

    /// Record that the server answered (a pong or any other frame).
    pub fn record_pong(&self) {
        *self.last_pong.write() = Instant::now();
        self.waiting_for_pong.store(false, Ordering::SeqCst);
    }

    /// Mark that a ping is outstanding.
    pub fn mark_ping_sent(&self) {
        self.waiting_for_pong.store(true, Ordering::SeqCst);
    }

    /// Whether a ping is outstanding.
    #[must_use]
    pub fn is_waiting_for_pong(&self) -> bool {
        self.waiting_for_pong.load(Ordering::SeqCst)
    }

    /// Time since the server was last heard from.
    #[must_use]
    pub fn time_since_pong(&self) -> Duration {
        self.last_pong.read().elapsed()
    }

    /// Reset state for a new session.
    pub fn reset(&self) {
        *self.last_pong.write() = Instant::now();
        self.waiting_for_pong.store(false, Ordering::SeqCst);
    }
}

struct RunningHeartbeat {
    cancel: CancellationToken,
    events: mpsc::Receiver<HeartbeatEvent>,
    task: JoinHandle<()>,
}

/// Periodic ping scheduler; at most one timer runs per instance.
///
/// # Example
///
/// ```rust,no_run
/// use itick_stream_client::infrastructure::itick::heartbeat::{
///     HeartbeatConfig, HeartbeatEvent, HeartbeatScheduler,
/// };
///
/// async fn example() {
///     let mut heartbeat = HeartbeatScheduler::new(HeartbeatConfig::default());
///     heartbeat.start();
///
///     loop {
///         match heartbeat.next_event().await {
///             HeartbeatEvent::SendPing => {
///                 // send {"ac":"ping",...}
///                 heartbeat.state().mark_ping_sent();
///             }
///             HeartbeatEvent::Timeout => break,
///         }
///     }
///
///     heartbeat.stop();
/// }
/// ```
pub struct HeartbeatScheduler {
    config: HeartbeatConfig,
    state: Arc<HeartbeatState>,
    running: Option<RunningHeartbeat>,
}

impl std::fmt::Debug for HeartbeatScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatScheduler")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl HeartbeatScheduler {
    /// Create a stopped scheduler.
    #[must_use]
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            state: Arc::new(HeartbeatState::new()),
            running: None,
        }
    }

    /// Shared liveness state.
    #[must_use]
    pub const fn state(&self) -> &Arc<HeartbeatState> {
        &self.state
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    /// Start ticking. A scheduler that is already running is stopped first.
    pub fn start(&mut self) {
        self.stop();
        self.state.reset();

        let (event_tx, events) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_heartbeat(
            self.config.clone(),
            Arc::clone(&self.state),
            event_tx,
            cancel.clone(),
        ));

        tracing::debug!(
            interval_ms = u64::try_from(self.config.ping_interval.as_millis()).unwrap_or(u64::MAX),
            "Heartbeat started"
        );
        self.running = Some(RunningHeartbeat {
            cancel,
            events,
            task,
        });
    }

    /// Stop ticking. Safe to call when not running.
    ///
    /// Events already queued by the old timer are discarded with it.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            tracing::debug!("Heartbeat stopped");
        }
    }

    /// Whether a timer task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Wait for the next event from the running timer.
    ///
    /// Never resolves while stopped, so it can sit in a `select!` next to other
    /// sources unconditionally.
    pub async fn next_event(&mut self) -> HeartbeatEvent {
        let Some(running) = self.running.as_mut() else {
            return future::pending().await;
        };

        if let Some(event) = running.events.recv().await {
            return event;
        }

        self.running = None;
        future::pending().await
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_heartbeat(
    config: HeartbeatConfig,
    state: Arc<HeartbeatState>,
    event_tx: mpsc::Sender<HeartbeatEvent>,
    cancel: CancellationToken,
) {
    let period = config
        .ping_interval
        .clamp(Duration::from_millis(1), MAX_HEARTBEAT_INTERVAL);
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Some(timeout) = config.pong_timeout {
                    let silent_for = state.time_since_pong();
                    if state.is_waiting_for_pong() && silent_for > timeout {
                        tracing::warn!(
                            silent_ms = u64::try_from(silent_for.as_millis()).unwrap_or(u64::MAX),
                            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                            "Heartbeat timeout detected"
                        );
                        let _ = event_tx.send(HeartbeatEvent::Timeout).await;
                        break;
                    }
                }

                if event_tx.send(HeartbeatEvent::SendPing).await.is_err() {
                    tracing::debug!("Heartbeat receiver dropped, stopping");
                    break;
                }
            }
        }
    }
}

/// Error type for heartbeat operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeartbeatError {
    /// Nothing was heard from the server within the timeout.
    #[error("heartbeat timeout after {0:?}")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = HeartbeatConfig::default();
        assert_eq!(config.ping_interval, Duration::from_secs(15));
        assert!(config.pong_timeout.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn state_record_pong() {
        let state = HeartbeatState::new();
        assert!(!state.is_waiting_for_pong());

        state.mark_ping_sent();
        assert!(state.is_waiting_for_pong());

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(state.time_since_pong(), Duration::from_secs(3));

        state.record_pong();
        assert!(!state.is_waiting_for_pong());
        assert_eq!(state.time_since_pong(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_interval_is_capped() {
        let mut heartbeat =
            HeartbeatScheduler::new(HeartbeatConfig::new(Duration::from_secs(u64::MAX), None));
        heartbeat.start();

        let event = tokio::time::timeout(
            MAX_HEARTBEAT_INTERVAL + Duration::from_secs(1),
            heartbeat.next_event(),
        )
        .await
        .unwrap();
        assert_eq!(event, HeartbeatEvent::SendPing);
        assert!(heartbeat.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn first_ping_after_one_interval() {
        let mut heartbeat =
            HeartbeatScheduler::new(HeartbeatConfig::new(Duration::from_secs(15), None));
        let started = Instant::now();
        heartbeat.start();
        assert!(heartbeat.is_running());

        assert_eq!(heartbeat.next_event().await, HeartbeatEvent::SendPing);
        assert_eq!(started.elapsed(), Duration::from_secs(15));

        assert_eq!(heartbeat.next_event().await, HeartbeatEvent::SendPing);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_silences_events() {
        let mut heartbeat =
            HeartbeatScheduler::new(HeartbeatConfig::new(Duration::from_secs(1), None));
        heartbeat.stop();
        assert!(!heartbeat.is_running());

        heartbeat.start();
        heartbeat.stop();
        heartbeat.stop();
        assert!(!heartbeat.is_running());

        let waited = tokio::time::timeout(Duration::from_secs(10), heartbeat.next_event()).await;
        assert!(waited.is_err(), "stopped scheduler must not emit events");
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_the_running_timer() {
        let mut heartbeat =
            HeartbeatScheduler::new(HeartbeatConfig::new(Duration::from_secs(10), None));
        let started = Instant::now();
        heartbeat.start();

        tokio::time::advance(Duration::from_secs(6)).await;
        heartbeat.start();

        assert_eq!(heartbeat.next_event().await, HeartbeatEvent::SendPing);
        assert_eq!(started.elapsed(), Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn silence_beyond_timeout_emits_timeout() {
        let mut heartbeat = HeartbeatScheduler::new(HeartbeatConfig::new(
            Duration::from_secs(5),
            Some(Duration::from_secs(8)),
        ));
        heartbeat.start();

        assert_eq!(heartbeat.next_event().await, HeartbeatEvent::SendPing);
        heartbeat.state().mark_ping_sent();

        assert_eq!(heartbeat.next_event().await, HeartbeatEvent::SendPing);
        assert_eq!(heartbeat.next_event().await, HeartbeatEvent::Timeout);

        tokio::task::yield_now().await;
        assert!(!heartbeat.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn pongs_keep_the_session_alive() {
        let mut heartbeat = HeartbeatScheduler::new(HeartbeatConfig::new(
            Duration::from_secs(5),
            Some(Duration::from_secs(8)),
        ));
        heartbeat.start();

        for _ in 0..10 {
            assert_eq!(heartbeat.next_event().await, HeartbeatEvent::SendPing);
            heartbeat.state().mark_ping_sent();
            heartbeat.state().record_pong();
        }
    }
}
