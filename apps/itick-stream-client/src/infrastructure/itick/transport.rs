//! Transport Session
//!
//! Owns one physical connection at a time. A [`TransportSession`] runs a
//! writer task draining an outbound queue into the frame sink and a reader
//! task forwarding inbound text frames, in arrival order, as
//! [`SessionSignal`]s. The reader is the only task that reports
//! [`SessionSignal::Closed`], exactly once per session, carrying the first
//! recorded [`CloseReason`].
//!
//! Failures are reported, never retried here.
//!
//! # Stream URL
//!
//! - Production: `wss://api.itick.org/fws`

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, future};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{Connector, SessionLink, TransportError};

/// Default bound on a single open attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// WebSocket Connector
// =============================================================================

/// Opens WebSocket sessions with `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl WebSocketConnector {
    /// Create a connector with the given open timeout.
    #[must_use]
    pub const fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &str) -> Result<SessionLink, TransportError> {
        let (ws_stream, _response) =
            tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(url))
                .await
                .map_err(|_| TransportError::Timeout(self.connect_timeout))?
                .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(|e| TransportError::Send(e.to_string()))
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::Text(text.into()))));

        let stream = read
            .take_while(|msg| {
                if let Ok(Message::Close(frame)) = msg {
                    tracing::info!(frame = ?frame, "Server sent close frame");
                }
                future::ready(!matches!(msg, Ok(Message::Close(_))))
            })
            .filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(Message::Binary(bytes)) => Some(
                        String::from_utf8(bytes.to_vec())
                            .map_err(|e| TransportError::Receive(e.to_string())),
                    ),
                    Ok(_) => None,
                    Err(e) => Some(Err(TransportError::Receive(e.to_string()))),
                })
            });

        Ok(SessionLink::new(sink, stream))
    }
}

// =============================================================================
// Session Signals
// =============================================================================

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The owner called [`TransportSession::close`].
    Local,
    /// The remote side ended the stream.
    Remote,
    /// A read or write failed.
    Error(TransportError),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("closed locally"),
            Self::Remote => f.write_str("closed by remote"),
            Self::Error(e) => write!(f, "transport error: {e}"),
        }
    }
}

/// Lifecycle signal reported upward by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    /// An inbound text frame.
    Frame {
        /// Session that received it.
        session: u64,
        /// Frame payload.
        text: String,
    },
    /// The session ended; sent once.
    Closed {
        /// Session that ended.
        session: u64,
        /// First recorded reason.
        reason: CloseReason,
    },
}

// =============================================================================
// Transport Session
// =============================================================================

#[derive(Debug)]
struct SessionShared {
    open: AtomicBool,
    reason: Mutex<Option<CloseReason>>,
    cancel: CancellationToken,
}

impl SessionShared {
    fn shut(&self, reason: CloseReason) {
        {
            let mut slot = self.reason.lock();
            if slot.is_none() {
                *slot = Some(reason);
            }
        }
        self.open.store(false, Ordering::SeqCst);
        self.cancel.cancel();
    }

    fn take_reason(&self) -> CloseReason {
        self.reason.lock().clone().unwrap_or(CloseReason::Remote)
    }
}

/// Handle to one open physical session.
#[derive(Debug)]
pub struct TransportSession {
    id: u64,
    outbound: mpsc::UnboundedSender<String>,
    shared: Arc<SessionShared>,
}

impl TransportSession {
    /// Start the reader and writer tasks for an opened link.
    #[must_use]
    pub fn spawn(id: u64, link: SessionLink, signals: mpsc::UnboundedSender<SessionSignal>) -> Self {
        let SessionLink { mut sink, mut stream } = link;
        let shared = Arc::new(SessionShared {
            open: AtomicBool::new(true),
            reason: Mutex::new(None),
            cancel: CancellationToken::new(),
        });
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();

        let writer_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = writer_shared.cancel.cancelled() => break,
                    next = outbound_rx.recv() => {
                        let Some(text) = next else { break };
                        if let Err(e) = sink.send(text).await {
                            tracing::warn!(session = id, error = %e, "Frame write failed");
                            writer_shared.shut(CloseReason::Error(e));
                            break;
                        }
                    }
                }
            }
            let _ = sink.close().await;
        });

        let reader_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = reader_shared.cancel.cancelled() => break,
                    next = stream.next() => match next {
                        Some(Ok(text)) => {
                            if signals.send(SessionSignal::Frame { session: id, text }).is_err() {
                                reader_shared.shut(CloseReason::Local);
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            reader_shared.shut(CloseReason::Error(e));
                            break;
                        }
                        None => {
                            reader_shared.shut(CloseReason::Remote);
                            break;
                        }
                    }
                }
            }

            let reason = reader_shared.take_reason();
            tracing::debug!(session = id, reason = %reason, "Session reader finished");
            let _ = signals.send(SessionSignal::Closed { session: id, reason });
        });

        Self {
            id,
            outbound,
            shared,
        }
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Whether the session can still send.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }

    /// Queue one text frame for sending.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotOpen`] once the session is closing or closed.
    pub fn send(&self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        self.outbound.send(text).map_err(|_| TransportError::NotOpen)
    }

    /// Close the session. Idempotent; a close after a failure keeps the
    /// failure as the reported reason.
    pub fn close(&self) {
        self.shared.shut(CloseReason::Local);
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc as fmpsc;

    struct Remote {
        received: fmpsc::UnboundedReceiver<String>,
        inject: fmpsc::UnboundedSender<Result<String, TransportError>>,
    }

    fn link_pair() -> (SessionLink, Remote) {
        let (client_tx, received) = fmpsc::unbounded::<String>();
        let (inject, client_rx) = fmpsc::unbounded::<Result<String, TransportError>>();
        let sink = client_tx.sink_map_err(|e| TransportError::Send(e.to_string()));
        (SessionLink::new(sink, client_rx), Remote { received, inject })
    }

    async fn next_signal(rx: &mut mpsc::UnboundedReceiver<SessionSignal>) -> SessionSignal {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("signal in time")
            .expect("signal channel open")
    }

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let (link, remote) = link_pair();
        let (signal_tx, mut signals) = mpsc::unbounded_channel();
        let _session = TransportSession::spawn(7, link, signal_tx);

        for text in ["one", "two", "three"] {
            remote.inject.unbounded_send(Ok(text.to_string())).unwrap();
        }

        for expected in ["one", "two", "three"] {
            assert_eq!(
                next_signal(&mut signals).await,
                SessionSignal::Frame {
                    session: 7,
                    text: expected.to_string(),
                }
            );
        }
    }

    #[tokio::test]
    async fn send_reaches_the_sink() {
        let (link, mut remote) = link_pair();
        let (signal_tx, _signals) = mpsc::unbounded_channel();
        let session = TransportSession::spawn(1, link, signal_tx);

        session.send("hello".to_string()).unwrap();
        let sent = tokio::time::timeout(Duration::from_secs(1), remote.received.next())
            .await
            .unwrap();
        assert_eq!(sent.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn local_close_reports_once_and_refuses_sends() {
        let (link, _remote) = link_pair();
        let (signal_tx, mut signals) = mpsc::unbounded_channel();
        let session = TransportSession::spawn(3, link, signal_tx);

        session.close();
        session.close();
        assert!(!session.is_open());
        assert_eq!(session.send("late".to_string()), Err(TransportError::NotOpen));

        assert_eq!(
            next_signal(&mut signals).await,
            SessionSignal::Closed {
                session: 3,
                reason: CloseReason::Local,
            }
        );
        let extra = tokio::time::timeout(Duration::from_millis(50), signals.recv()).await;
        assert!(matches!(extra, Ok(None) | Err(_)));
    }

    #[tokio::test]
    async fn remote_end_is_reported() {
        let (link, remote) = link_pair();
        let (signal_tx, mut signals) = mpsc::unbounded_channel();
        let session = TransportSession::spawn(4, link, signal_tx);

        drop(remote);

        assert_eq!(
            next_signal(&mut signals).await,
            SessionSignal::Closed {
                session: 4,
                reason: CloseReason::Remote,
            }
        );
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn read_error_is_reported() {
        let (link, remote) = link_pair();
        let (signal_tx, mut signals) = mpsc::unbounded_channel();
        let _session = TransportSession::spawn(5, link, signal_tx);

        remote
            .inject
            .unbounded_send(Err(TransportError::Receive("reset".to_string())))
            .unwrap();

        assert_eq!(
            next_signal(&mut signals).await,
            SessionSignal::Closed {
                session: 5,
                reason: CloseReason::Error(TransportError::Receive("reset".to_string())),
            }
        );
    }

    #[test]
    fn close_reason_display() {
        assert_eq!(CloseReason::Local.to_string(), "closed locally");
        assert_eq!(
            CloseReason::Error(TransportError::NotOpen).to_string(),
            "transport error: transport is not open"
        );
    }
}
