//! Dispatch Registry
//!
//! Holds one handler list per data kind and fans decoded events out to
//! them.
//!
//! # Delivery
//!
//! `notify` runs every handler registered for the event's kind, in
//! registration order, on the calling task. The handler list is snapshotted
//! before any handler runs, so a handler may register or unregister others
//! without deadlocking; the change applies from the next event.
//!
//! A handler that returns an error or panics is logged and skipped. The
//! remaining handlers for the same event still run, and later events are
//! unaffected.
//!
//! Handlers run inline on the connection task and must not block.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::domain::market_data::{CandleUpdate, Depth, MarketEvent, Quote, Trade};
use crate::domain::subscription::DataKind;

/// Result returned by event handlers.
pub type HandlerResult = anyhow::Result<()>;

type ErasedHandler = Arc<dyn Fn(&MarketEvent) -> HandlerResult + Send + Sync>;

// =============================================================================
// Payload Trait
// =============================================================================

/// An event payload that handlers can register for.
///
/// Implemented for [`Quote`], [`Trade`], [`Depth`] and [`CandleUpdate`].
pub trait MarketEventPayload: Send + Sync + 'static {
    /// Data kind this payload is delivered under.
    const KIND: DataKind;

    /// Borrow the payload out of an event of the matching kind.
    fn from_event(event: &MarketEvent) -> Option<&Self>;
}

impl MarketEventPayload for Quote {
    const KIND: DataKind = DataKind::Quote;

    fn from_event(event: &MarketEvent) -> Option<&Self> {
        match event {
            MarketEvent::Quote(q) => Some(q),
            _ => None,
        }
    }
}

impl MarketEventPayload for Trade {
    const KIND: DataKind = DataKind::Tick;

    fn from_event(event: &MarketEvent) -> Option<&Self> {
        match event {
            MarketEvent::Trade(t) => Some(t),
            _ => None,
        }
    }
}

impl MarketEventPayload for Depth {
    const KIND: DataKind = DataKind::Depth;

    fn from_event(event: &MarketEvent) -> Option<&Self> {
        match event {
            MarketEvent::Depth(d) => Some(d),
            _ => None,
        }
    }
}

impl MarketEventPayload for CandleUpdate {
    const KIND: DataKind = DataKind::Candle;

    fn from_event(event: &MarketEvent) -> Option<&Self> {
        match event {
            MarketEvent::Candle(c) => Some(c),
            _ => None,
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Handle returned by registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId {
    kind: DataKind,
    seq: u64,
}

impl HandlerId {
    /// Data kind the handler was registered for.
    #[must_use]
    pub const fn kind(&self) -> DataKind {
        self.kind
    }
}

/// Result of dispatching one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Handlers that completed successfully.
    pub delivered: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

struct HandlerEntry {
    seq: u64,
    handler: ErasedHandler,
}

/// Per-kind subscriber lists with typed registration.
///
/// # Example
///
/// ```rust
/// use itick_stream_client::{DispatchRegistry, MarketEvent, Quote};
///
/// let registry = DispatchRegistry::new();
/// let id = registry.register(|quote: &Quote| {
///     println!("{} last {}", quote.symbol, quote.last_price);
///     Ok(())
/// });
///
/// let outcome = registry.notify(&MarketEvent::Quote(Quote::default()));
/// assert_eq!(outcome.delivered, 1);
///
/// assert!(registry.unregister(id));
/// ```
pub struct DispatchRegistry {
    next_seq: AtomicU64,
    handlers: RwLock<HashMap<DataKind, Vec<HandlerEntry>>>,
}

impl Default for DispatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DispatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read();
        let counts: HashMap<DataKind, usize> =
            handlers.iter().map(|(kind, list)| (*kind, list.len())).collect();
        f.debug_struct("DispatchRegistry")
            .field("handlers", &counts)
            .finish()
    }
}

impl DispatchRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_seq: AtomicU64::new(1),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Append a handler for the payload type `E`.
    ///
    /// The payload type selects the kind: `|q: &Quote|` registers for
    /// quotes, `|d: &Depth|` for depth, and so on.
    pub fn register<E, F>(&self, handler: F) -> HandlerId
    where
        E: MarketEventPayload,
        F: Fn(&E) -> HandlerResult + Send + Sync + 'static,
    {
        let erased: ErasedHandler = Arc::new(move |event: &MarketEvent| {
            E::from_event(event).map_or(Ok(()), &handler)
        });

        let kind = E::KIND;
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push(HandlerEntry {
                seq,
                handler: erased,
            });

        tracing::debug!(kind = %kind, handler = seq, "Registered event handler");

        HandlerId { kind, seq }
    }

    /// Remove a previously registered handler.
    ///
    /// Returns `false` if the handler was already removed.
    pub fn unregister(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(&id.kind) else {
            return false;
        };

        let before = list.len();
        list.retain(|entry| entry.seq != id.seq);
        before != list.len()
    }

    /// Number of handlers registered for a kind.
    #[must_use]
    pub fn handler_count(&self, kind: DataKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver an event to every handler registered for its kind.
    pub fn notify(&self, event: &MarketEvent) -> DispatchOutcome {
        let kind = event.kind();
        let snapshot: Vec<(u64, ErasedHandler)> = self
            .handlers
            .read()
            .get(&kind)
            .map(|list| {
                list.iter()
                    .map(|entry| (entry.seq, Arc::clone(&entry.handler)))
                    .collect()
            })
            .unwrap_or_default();

        let mut outcome = DispatchOutcome::default();

        for (seq, handler) in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => outcome.delivered += 1,
                Ok(Err(e)) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        kind = %kind,
                        handler = seq,
                        symbol = event.symbol(),
                        error = %format!("{e:#}"),
                        "Event handler failed"
                    );
                }
                Err(payload) => {
                    outcome.failed += 1;
                    tracing::error!(
                        kind = %kind,
                        handler = seq,
                        symbol = event.symbol(),
                        panic = panic_message(payload.as_ref()),
                        "Event handler panicked"
                    );
                }
            }
        }

        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
