//! iTick Stream Client Binary
//!
//! Connects to the iTick realtime stream, subscribes to the configured
//! instruments, and logs every decoded event until interrupted.
//!
//! # Usage
//!
//! ```bash
//! ITICK_TOKEN=... ITICK_SYMBOLS='AAPL$US,700$HK' ITICK_TYPES=quote,depth \
//!     cargo run --bin itick-stream-client
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `ITICK_TOKEN`: access token
//!
//! ## Optional
//! - `ITICK_WS_URL`: stream endpoint (default: wss://api.itick.org/fws)
//! - `ITICK_SYMBOLS` / `ITICK_TYPES`: subscription issued at startup
//! - `ITICK_ALLOWED_KINDS`: kinds callers may subscribe to (default: all)
//! - `ITICK_HEARTBEAT_INTERVAL_SECS`: ping interval (default: 15)
//! - `ITICK_PONG_TIMEOUT_SECS`: silence before reconnecting (default: 0, disabled)
//! - `ITICK_CONNECT_TIMEOUT_SECS`: bound on one open attempt (default: 10)
//! - `ITICK_RECONNECT_DELAY_MS`, `ITICK_RECONNECT_DELAY_MAX_MS`,
//!   `ITICK_RECONNECT_MULTIPLIER`, `ITICK_RECONNECT_JITTER`,
//!   `ITICK_MAX_RECONNECT_ATTEMPTS`
//! - `ITICK_METRICS_PORT`: Prometheus metrics port (default: 0, disabled)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `RUST_LOG`: Log filter (default: itick_stream_client=info)

use std::sync::Arc;

use itick_stream_client::infrastructure::telemetry;
use itick_stream_client::{
    CandleUpdate, ClientSettings, ConnectionManager, Depth, DispatchRegistry, Quote, Trade,
    WebSocketConnector, init_metrics,
};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "failed to install rustls crypto provider")?;

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting iTick stream client");

    let settings = ClientSettings::from_env()?;
    log_settings(&settings);

    if settings.metrics_port != 0 {
        init_metrics(settings.metrics_port)?;
        tracing::info!(port = settings.metrics_port, "Metrics exporter listening");
    }

    let registry = Arc::new(DispatchRegistry::new());
    register_logging_handlers(&registry);

    let connector = Arc::new(WebSocketConnector::new(settings.websocket.connect_timeout));
    let manager = ConnectionManager::spawn(settings.stream_config(), connector, registry);

    if let Some(request) = settings.initial_subscription.as_ref() {
        manager.subscribe(request.symbols(), request.kinds())?;
    } else {
        tracing::warn!("No ITICK_SYMBOLS configured, connecting without subscriptions");
    }

    manager.connect()?;

    await_shutdown().await;

    manager.shutdown().await;
    tracing::info!(state = %manager.state(), "Stream client stopped");
    Ok(())
}

/// Log each event kind as it arrives.
fn register_logging_handlers(registry: &DispatchRegistry) {
    registry.register(|quote: &Quote| {
        tracing::info!(
            symbol = %quote.symbol,
            last = quote.last_price,
            volume = quote.volume,
            "Quote"
        );
        Ok(())
    });

    registry.register(|trade: &Trade| {
        tracing::info!(
            symbol = %trade.symbol,
            price = trade.last_price,
            volume = trade.volume,
            "Trade"
        );
        Ok(())
    });

    registry.register(|depth: &Depth| {
        tracing::info!(
            symbol = %depth.symbol,
            best_ask = depth.best_ask().map(|level| level.price),
            best_bid = depth.best_bid().map(|level| level.price),
            asks = depth.asks.len(),
            bids = depth.bids.len(),
            "Depth"
        );
        Ok(())
    });

    registry.register(|update: &CandleUpdate| {
        tracing::info!(
            symbol = %update.symbol,
            period = update.period,
            close = update.candle.close,
            "Candle"
        );
        Ok(())
    });
}

/// Log the parsed configuration.
fn log_settings(settings: &ClientSettings) {
    let heartbeat_ms =
        u64::try_from(settings.websocket.heartbeat_interval.as_millis()).unwrap_or(u64::MAX);
    tracing::info!(
        url = %settings.url,
        heartbeat_ms,
        max_reconnect_attempts = settings.websocket.max_reconnect_attempts,
        metrics_port = settings.metrics_port,
        "Configuration loaded"
    );
    if let Some(request) = settings.initial_subscription.as_ref() {
        tracing::debug!(
            symbols = %request.symbols().join(","),
            kinds = ?request.kinds(),
            "Initial subscription"
        );
    }
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
