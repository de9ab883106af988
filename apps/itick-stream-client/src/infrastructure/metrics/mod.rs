//! Prometheus Metrics Module
//!
//! Counters and gauges for the stream client, recorded through the `metrics`
//! facade. Recording is a no-op until [`init_metrics`] installs the
//! Prometheus exporter, so the library never depends on it.
//!
//! # Metrics Categories
//!
//! - **Frames**: text frames received, frames sent by action, decode errors
//! - **Dispatch**: events delivered and handler failures by data kind
//! - **Connection**: state gauge, reconnect attempts, authentication failures

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::subscription::DataKind;
use crate::infrastructure::itick::messages::Action;

// =============================================================================
// Exporter
// =============================================================================

/// Install the Prometheus recorder with an HTTP listener on `port`.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or a global recorder is
/// already installed.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .install()?;

    register_metrics();
    Ok(())
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "itick_client_frames_received_total",
        "Total text frames received from the iTick stream"
    );
    describe_counter!(
        "itick_client_frames_sent_total",
        "Total control frames sent to the iTick stream by action"
    );
    describe_counter!(
        "itick_client_decode_errors_total",
        "Total inbound frames discarded as undecodable"
    );

    describe_counter!(
        "itick_client_events_dispatched_total",
        "Total handler deliveries by data kind"
    );
    describe_counter!(
        "itick_client_handler_failures_total",
        "Total handler errors and panics by data kind"
    );

    describe_gauge!(
        "itick_client_connection_state",
        "Connection state (0 disconnected, 1 connecting, 2 authenticating, 3 ready, 4 closed)"
    );
    describe_counter!(
        "itick_client_reconnects_total",
        "Total scheduled reconnection attempts"
    );
    describe_counter!(
        "itick_client_auth_failures_total",
        "Total rejected authentication attempts"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record one inbound text frame.
pub fn record_frame_received() {
    counter!("itick_client_frames_received_total").increment(1);
}

/// Record one outbound control frame.
pub fn record_frame_sent(action: Action) {
    counter!(
        "itick_client_frames_sent_total",
        "action" => action.as_str()
    )
    .increment(1);
}

/// Record a frame the codec could not decode.
pub fn record_decode_error() {
    counter!("itick_client_decode_errors_total").increment(1);
}

/// Record the outcome of dispatching one event.
pub fn record_dispatch(kind: DataKind, delivered: usize, failed: usize) {
    if delivered > 0 {
        counter!(
            "itick_client_events_dispatched_total",
            "kind" => kind.as_str()
        )
        .increment(u64::try_from(delivered).unwrap_or(u64::MAX));
    }
    if failed > 0 {
        counter!(
            "itick_client_handler_failures_total",
            "kind" => kind.as_str()
        )
        .increment(u64::try_from(failed).unwrap_or(u64::MAX));
    }
}

/// Update the connection state gauge.
pub fn set_connection_state(code: f64) {
    gauge!("itick_client_connection_state").set(code);
}

/// Record a scheduled reconnection attempt.
pub fn record_reconnect() {
    counter!("itick_client_reconnects_total").increment(1);
}

/// Record a rejected authentication.
pub fn record_auth_failure() {
    counter!("itick_client_auth_failures_total").increment(1);
}

// =============================================================================
// Tests
// =============================================================================
