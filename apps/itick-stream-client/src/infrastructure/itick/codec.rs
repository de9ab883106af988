//! Stream Codec Module
//!
//! Encoding and decoding for the iTick WebSocket stream. Every frame is one
//! JSON object.
//!
//! # Decoding Policy
//!
//! 1. An object carrying `resAc` is a control response, whatever else it holds.
//! 2. Otherwise the nested `data` object is inspected:
//!    `type` = `quote` / `tick` / `depth` selects the event, and a missing
//!    `type` with an embedded candle (`k`) is a candle update.
//! 3. Anything else is a [`CodecError`]; callers log it and drop the frame.

use serde_json::{Map, Value};

use crate::domain::market_data::{CandleUpdate, Depth, MarketEvent, Quote, Trade};
use crate::infrastructure::itick::messages::{ControlResponse, Inbound};

const PREVIEW_CHARS: usize = 50;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// `data.type` named an event this client does not know.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// `data` carried neither a `type` nor a candle.
    #[error("data frame has no type discriminator")]
    MissingDiscriminator,

    /// Object with neither `resAc` nor `data`.
    #[error("unrecognized frame: {0}")]
    UnrecognizedFrame(String),

    /// Frame is not shaped like any protocol message.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// JSON codec for the iTick stream.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not JSON, is not an object, or does not
    /// match any control or data shape.
    pub fn decode(&self, text: &str) -> Result<Inbound, CodecError> {
        let trimmed = text.trim();
        let Value::Object(mut envelope) = serde_json::from_str::<Value>(trimmed)? else {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}",
                preview(trimmed)
            )));
        };

        if envelope.contains_key("resAc") {
            let response: ControlResponse = serde_json::from_value(Value::Object(envelope))?;
            return Ok(Inbound::Control(response));
        }

        match envelope.remove("data") {
            Some(Value::Object(data)) => self.decode_event(data).map(Inbound::Event),
            Some(other) => Err(CodecError::InvalidFormat(format!(
                "data is not an object: {}",
                preview(&other.to_string())
            ))),
            None => Err(CodecError::UnrecognizedFrame(preview(trimmed))),
        }
    }

    fn decode_event(&self, data: Map<String, Value>) -> Result<MarketEvent, CodecError> {
        let discriminator = match data.get("type") {
            None | Some(Value::Null) => None,
            Some(Value::String(tag)) => Some(tag.clone()),
            Some(other) => {
                return Err(CodecError::InvalidFormat(format!(
                    "non-string type discriminator: {other}"
                )));
            }
        };
        let has_candle = data.contains_key("k");
        let value = Value::Object(data);

        let event = match discriminator.as_deref() {
            Some("quote") => MarketEvent::Quote(serde_json::from_value::<Quote>(value)?),
            Some("tick") => MarketEvent::Trade(serde_json::from_value::<Trade>(value)?),
            Some("depth") => MarketEvent::Depth(serde_json::from_value::<Depth>(value)?),
            Some("candle" | "kline") | None if has_candle => {
                MarketEvent::Candle(serde_json::from_value::<CandleUpdate>(value)?)
            }
            Some(other) => return Err(CodecError::UnknownEventType(other.to_string())),
            None => return Err(CodecError::MissingDiscriminator),
        };

        Ok(event)
    }

    /// Encode a value to JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode<T: serde::Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }

    /// Encode an event in the server's data-frame shape.
    ///
    /// Quotes, trades and depth carry a `type` tag; candles carry none.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode_event(&self, event: &MarketEvent) -> Result<String, CodecError> {
        let (payload, tag) = match event {
            MarketEvent::Quote(quote) => (serde_json::to_value(quote)?, Some("quote")),
            MarketEvent::Trade(trade) => (serde_json::to_value(trade)?, Some("tick")),
            MarketEvent::Depth(depth) => (serde_json::to_value(depth)?, Some("depth")),
            MarketEvent::Candle(update) => (serde_json::to_value(update)?, None),
        };

        let mut data = match payload {
            Value::Object(map) => map,
            other => {
                return Err(CodecError::InvalidFormat(format!(
                    "event did not serialize to an object: {other}"
                )));
            }
        };
        if let Some(tag) = tag {
            data.insert("type".to_string(), Value::String(tag.to_string()));
        }

        let mut envelope = Map::new();
        envelope.insert("data".to_string(), Value::Object(data));
        Ok(serde_json::to_string(&Value::Object(envelope))?)
    }
}

fn preview(text: &str) -> String {
    let mut shown: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        shown.push_str("...");
    }
    shown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market_data::{Candle, DepthLevel};
    use crate::infrastructure::itick::messages::{ControlAction, WireMessage};
    use test_case::test_case;

    fn decode_event(text: &str) -> MarketEvent {
        match JsonCodec::new().decode(text).unwrap() {
            Inbound::Event(event) => event,
            Inbound::Control(resp) => panic!("expected event, got control {resp:?}"),
        }
    }

    #[test]
    fn decode_control_response() {
        let codec = JsonCodec::new();
        let inbound = codec.decode(r#"{"resAc":"pong","code":1,"data":"1718000000000"}"#).unwrap();
        let Inbound::Control(resp) = inbound else {
            panic!("expected control response");
        };
        assert_eq!(resp.res_ac, ControlAction::Pong);
        assert!(resp.is_success());
    }

    #[test]
    fn decode_quote() {
        let event = decode_event(
            r#"{"code":1,"data":{"s":"AAPL","ld":189.5,"o":188.0,"h":190.1,"l":187.9,"t":1718000000000,"v":1200,"tu":227400.5,"ts":0,"type":"quote"}}"#,
        );
        let MarketEvent::Quote(quote) = event else {
            panic!("expected quote");
        };
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.last_price, 189.5);
        assert_eq!(quote.turnover, 227_400.5);
    }

    #[test]
    fn decode_tick_as_trade() {
        let event =
            decode_event(r#"{"data":{"s":"BTCUSDT","ld":65000.5,"v":0.25,"t":1718000000001,"type":"tick"}}"#);
        let MarketEvent::Trade(trade) = event else {
            panic!("expected trade");
        };
        assert_eq!(trade.volume, 0.25);
        assert_eq!(trade.timestamp, 1_718_000_000_001);
    }

    #[test]
    fn decode_depth_preserves_level_order() {
        let event = decode_event(
            r#"{"data":{"s":"700$HK","type":"depth","a":[{"po":1,"p":320.2,"v":100,"o":2},{"po":2,"p":320.4,"v":50,"o":1}],"b":[{"po":1,"p":320.0,"v":80,"o":3},{"po":2,"p":319.8,"v":60,"o":2},{"po":3,"p":319.6,"v":40,"o":1}]}}"#,
        );
        let MarketEvent::Depth(depth) = event else {
            panic!("expected depth");
        };
        assert_eq!(depth.asks.len(), 2);
        assert_eq!(depth.bids.len(), 3);
        let bid_ranks: Vec<i64> = depth.bids.iter().map(|level| level.rank).collect();
        assert_eq!(bid_ranks, vec![1, 2, 3]);
    }

    #[test]
    fn decode_candle_without_type() {
        let event = decode_event(
            r#"{"data":{"s":"EURUSD","t":2,"k":{"o":1.08,"h":1.09,"l":1.07,"c":1.085,"v":300,"tu":324.5,"t":1718000000000,"st":1717999940000}}}"#,
        );
        let MarketEvent::Candle(update) = event else {
            panic!("expected candle");
        };
        assert_eq!(update.period, 2);
        assert_eq!(update.candle.close, 1.085);
        assert_eq!(update.candle.period_start, Some(1_717_999_940_000));
    }

    #[test_case("not json" ; "not json")]
    #[test_case("[1,2,3]" ; "top level array")]
    #[test_case(r#"{"code":1}"# ; "no resAc and no data")]
    #[test_case(r#"{"data":"text"}"# ; "data not an object")]
    #[test_case(r#"{"data":{"s":"AAPL"}}"# ; "no type and no candle")]
    #[test_case(r#"{"data":{"s":"AAPL","type":"news"}}"# ; "unknown type")]
    #[test_case(r#"{"data":{"s":"AAPL","type":7}}"# ; "numeric type")]
    #[test_case(r#"{"data":{"s":"AAPL","ld":"abc","type":"quote"}}"# ; "wrong field type")]
    fn decode_rejects_malformed_frames(text: &str) {
        assert!(JsonCodec::new().decode(text).is_err());
    }

    #[test]
    fn decode_error_variants() {
        let codec = JsonCodec::new();
        assert!(matches!(
            codec.decode(r#"{"data":{"type":"news"}}"#),
            Err(CodecError::UnknownEventType(tag)) if tag == "news"
        ));
        assert!(matches!(
            codec.decode(r#"{"data":{"s":"AAPL"}}"#),
            Err(CodecError::MissingDiscriminator)
        ));
        assert!(matches!(
            codec.decode(r#"{"code":1}"#),
            Err(CodecError::UnrecognizedFrame(_))
        ));
        assert!(matches!(codec.decode("{"), Err(CodecError::Json(_))));
    }

    #[test]
    fn control_response_round_trip() {
        let codec = JsonCodec::new();
        let mut response = ControlResponse::new(ControlAction::Subscribe, 0);
        response.msg = Some("symbol not found".to_string());

        let text = codec.encode(&response).unwrap();
        let Inbound::Control(decoded) = codec.decode(&text).unwrap() else {
            panic!("expected control response");
        };
        assert_eq!(decoded, response);
    }

    #[test]
    fn event_round_trip_covers_every_kind() {
        let codec = JsonCodec::new();
        let events = [
            MarketEvent::Quote(Quote {
                symbol: "AAPL".to_string(),
                last_price: 189.5,
                timestamp: 1_718_000_000_000,
                trading_status: 2,
                ..Quote::default()
            }),
            MarketEvent::Trade(Trade {
                symbol: "BTCUSDT".to_string(),
                last_price: 65_000.5,
                volume: 0.5,
                timestamp: 1_718_000_000_001,
            }),
            MarketEvent::Depth(Depth {
                symbol: "700$HK".to_string(),
                asks: vec![DepthLevel {
                    rank: 1,
                    price: 320.2,
                    size: 100.0,
                    order_count: 2,
                }],
                bids: vec![],
            }),
            MarketEvent::Candle(CandleUpdate {
                symbol: "EURUSD".to_string(),
                period: 1,
                candle: Candle {
                    close: 1.085,
                    timestamp: 1_718_000_000_000,
                    ..Candle::default()
                },
            }),
        ];

        for event in events {
            let text = codec.encode_event(&event).unwrap();
            assert_eq!(decode_event(&text), event);
        }
    }

    #[test]
    fn encoded_candle_has_no_type_tag() {
        let text = JsonCodec::new()
            .encode_event(&MarketEvent::Candle(CandleUpdate::default()))
            .unwrap();
        assert!(!text.contains("\"type\""));
    }

    #[test]
    fn encode_wire_message() {
        let text = JsonCodec::new().encode(&WireMessage::auth("token")).unwrap();
        assert_eq!(text, r#"{"ac":"auth","params":"token"}"#);
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        let long = "é".repeat(80);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }
}
