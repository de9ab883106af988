//! Market Data Event Types
//!
//! Decoded market data events delivered to handlers. Field names map
//! directly onto the compact keys used inside the `data` object of an
//! inbound frame.
//!
//! # Wire Keys
//!
//! | Event | Keys |
//! |---|---|
//! | Quote | `s`, `ld`, `o`, `h`, `l`, `t`, `v`, `tu`, `ts` |
//! | Trade | `s`, `ld`, `v`, `t` |
//! | Depth | `s`, `a[]`, `b[]` with levels `po`, `p`, `v`, `o` |
//! | Candle | `s`, `t` (period code), `k` with `o`, `h`, `l`, `c`, `v`, `tu`, `t`, `st` |
//!
//! Prices, volumes and turnover are `f64`; timestamps, codes and counts are
//! `i64`. No rounding or currency scaling is applied. Missing numeric keys
//! decode as zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::subscription::DataKind;

fn millis_to_time(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

// =============================================================================
// Quote
// =============================================================================

/// Quote snapshot for one instrument.
///
/// # Wire Format (JSON)
/// ```json
/// {"s":"AAPL","ld":189.5,"o":188.0,"h":190.1,"l":187.9,"t":1718000000000,
///  "v":1200345,"tu":227400000.5,"ts":0,"type":"quote"}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quote {
    /// Instrument identifier.
    #[serde(rename = "s")]
    pub symbol: String,

    /// Last traded price.
    #[serde(rename = "ld")]
    pub last_price: f64,

    /// Open price.
    #[serde(rename = "o")]
    pub open: f64,

    /// High price.
    #[serde(rename = "h")]
    pub high: f64,

    /// Low price.
    #[serde(rename = "l")]
    pub low: f64,

    /// Timestamp (epoch millis).
    #[serde(rename = "t")]
    pub timestamp: i64,

    /// Traded volume.
    #[serde(rename = "v")]
    pub volume: f64,

    /// Traded turnover.
    #[serde(rename = "tu")]
    pub turnover: f64,

    /// Trading status code.
    #[serde(rename = "ts")]
    pub trading_status: i64,
}

impl Quote {
    /// Quote time, if the timestamp is in range.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        millis_to_time(self.timestamp)
    }
}

// =============================================================================
// Trade
// =============================================================================

/// Single trade print, `tick` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trade {
    /// Instrument identifier.
    #[serde(rename = "s")]
    pub symbol: String,

    /// Trade price.
    #[serde(rename = "ld")]
    pub last_price: f64,

    /// Trade volume.
    #[serde(rename = "v")]
    pub volume: f64,

    /// Timestamp (epoch millis).
    #[serde(rename = "t")]
    pub timestamp: i64,
}

impl Trade {
    /// Trade time, if the timestamp is in range.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        millis_to_time(self.timestamp)
    }
}

// =============================================================================
// Depth
// =============================================================================

/// One price level of an order book side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthLevel {
    /// Level rank, 1 is best.
    #[serde(rename = "po")]
    pub rank: i64,

    /// Level price.
    #[serde(rename = "p")]
    pub price: f64,

    /// Aggregate size at this level.
    #[serde(rename = "v")]
    pub size: f64,

    /// Number of orders at this level.
    #[serde(rename = "o")]
    pub order_count: i64,
}

/// Order book depth snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Depth {
    /// Instrument identifier.
    #[serde(rename = "s")]
    pub symbol: String,

    /// Ask levels in the order received.
    #[serde(rename = "a")]
    pub asks: Vec<DepthLevel>,

    /// Bid levels in the order received.
    #[serde(rename = "b")]
    pub bids: Vec<DepthLevel>,
}

impl Depth {
    /// Best ask level, if any.
    #[must_use]
    pub fn best_ask(&self) -> Option<&DepthLevel> {
        self.asks.first()
    }

    /// Best bid level, if any.
    #[must_use]
    pub fn best_bid(&self) -> Option<&DepthLevel> {
        self.bids.first()
    }
}

// =============================================================================
// Candle
// =============================================================================

/// OHLC candle embedded in a candle update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Candle {
    /// Open price.
    #[serde(rename = "o")]
    pub open: f64,

    /// High price.
    #[serde(rename = "h")]
    pub high: f64,

    /// Low price.
    #[serde(rename = "l")]
    pub low: f64,

    /// Close price.
    #[serde(rename = "c")]
    pub close: f64,

    /// Traded volume.
    #[serde(rename = "v")]
    pub volume: f64,

    /// Traded turnover.
    #[serde(rename = "tu")]
    pub turnover: f64,

    /// Timestamp (epoch millis).
    #[serde(rename = "t")]
    pub timestamp: i64,

    /// Period start (epoch millis), when the server sends it.
    #[serde(rename = "st", skip_serializing_if = "Option::is_none")]
    pub period_start: Option<i64>,
}

/// Candle update for one instrument and period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandleUpdate {
    /// Instrument identifier.
    #[serde(rename = "s")]
    pub symbol: String,

    /// Period code as sent by the server.
    #[serde(rename = "t")]
    pub period: i64,

    /// The candle itself.
    #[serde(rename = "k")]
    pub candle: Candle,
}

impl CandleUpdate {
    /// Candle time, if the timestamp is in range.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        millis_to_time(self.candle.timestamp)
    }
}

// =============================================================================
// Market Event
// =============================================================================

/// A decoded data event.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    /// Quote snapshot.
    Quote(Quote),
    /// Trade print.
    Trade(Trade),
    /// Depth snapshot.
    Depth(Depth),
    /// Candle update.
    Candle(CandleUpdate),
}

impl MarketEvent {
    /// Data kind of this event.
    #[must_use]
    pub const fn kind(&self) -> DataKind {
        match self {
            Self::Quote(_) => DataKind::Quote,
            Self::Trade(_) => DataKind::Tick,
            Self::Depth(_) => DataKind::Depth,
            Self::Candle(_) => DataKind::Candle,
        }
    }

    /// Instrument identifier carried by the event.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Self::Quote(q) => &q.symbol,
            Self::Trade(t) => &t.symbol,
            Self::Depth(d) => &d.symbol,
            Self::Candle(c) => &c.symbol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_quote_with_wire_keys() {
        let json = r#"{"s":"AAPL","ld":189.5,"o":188.0,"h":190.1,"l":187.9,"t":1718000000000,"v":1200345,"tu":227400000.5,"ts":1,"type":"quote"}"#;
        let quote: Quote = serde_json::from_str(json).unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.last_price, 189.5);
        assert_eq!(quote.high, 190.1);
        assert_eq!(quote.volume, 1_200_345.0);
        assert_eq!(quote.trading_status, 1);
        assert_eq!(quote.time().unwrap().timestamp_millis(), 1_718_000_000_000);
    }

    #[test]
    fn missing_numeric_keys_default_to_zero() {
        let trade: Trade = serde_json::from_str(r#"{"s":"BTCUSDT","ld":65000.5}"#).unwrap();
        assert_eq!(trade.volume, 0.0);
        assert_eq!(trade.timestamp, 0);
    }

    #[test]
    fn deserialize_depth_levels_in_order() {
        let json = r#"{"s":"700$HK","a":[{"po":1,"p":320.2,"v":1000,"o":4},{"po":2,"p":320.4,"v":500,"o":2}],"b":[{"po":1,"p":320.0,"v":800,"o":3}]}"#;
        let depth: Depth = serde_json::from_str(json).unwrap();
        assert_eq!(depth.asks.len(), 2);
        assert_eq!(depth.bids.len(), 1);
        assert_eq!(depth.best_ask().unwrap().price, 320.2);
        assert_eq!(depth.asks[1].rank, 2);
        assert_eq!(depth.best_bid().unwrap().order_count, 3);
    }

    #[test]
    fn candle_period_start_is_optional() {
        let json = r#"{"s":"EURUSD","t":1,"k":{"o":1.08,"h":1.09,"l":1.07,"c":1.085,"v":300,"tu":324.5,"t":1718000000000}}"#;
        let update: CandleUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.period, 1);
        assert_eq!(update.candle.close, 1.085);
        assert!(update.candle.period_start.is_none());

        let serialized = serde_json::to_string(&update.candle).unwrap();
        assert!(!serialized.contains("st"));
    }

    #[test]
    fn market_event_kind_and_symbol() {
        let event = MarketEvent::Trade(Trade {
            symbol: "ETHUSDT".to_string(),
            ..Trade::default()
        });
        assert_eq!(event.kind(), DataKind::Tick);
        assert_eq!(event.symbol(), "ETHUSDT");
    }
}
