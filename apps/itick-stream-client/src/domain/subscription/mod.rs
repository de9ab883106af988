//! Subscription Types
//!
//! Domain types describing which instruments and data kinds a caller wants
//! streamed.
//!
//! # Design
//!
//! The remote service accepts a single `subscribe` action carrying a
//! comma-joined symbol list and a comma-joined kind list. The client keeps
//! the union of every request made over its lifetime in a
//! [`SubscriptionSet`] and replays that union verbatim after each successful
//! authentication. Both lists keep first-seen order and never contain
//! duplicates, so the replayed frame is stable across reconnects.

use std::fmt;
use std::str::FromStr;

// =============================================================================
// Data Kind
// =============================================================================

/// Category of streamed market data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataKind {
    /// Quote snapshots (last, open/high/low, volume, turnover).
    Quote,
    /// Individual trades, called `tick` on the wire.
    Tick,
    /// Order book depth.
    Depth,
    /// Candle (kline) updates.
    Candle,
}

impl DataKind {
    /// Get all recognised data kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Quote, Self::Tick, Self::Depth, Self::Candle]
    }

    /// Get the wire tag for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Tick => "tick",
            Self::Depth => "depth",
            Self::Candle => "candle",
        }
    }

    /// Parse a comma-separated kind list such as `"quote,depth"`.
    ///
    /// Blank entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::UnsupportedKind`] for the first entry that
    /// is not a recognised tag.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, SubscriptionError> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for DataKind {
    type Err = SubscriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quote" => Ok(Self::Quote),
            "tick" => Ok(Self::Tick),
            "depth" => Ok(Self::Depth),
            "candle" | "kline" => Ok(Self::Candle),
            other => Err(SubscriptionError::UnsupportedKind(other.to_string())),
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while building or acknowledging a subscription.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// Kind tag outside the recognised or configured set.
    #[error("unsupported data kind: {0}")]
    UnsupportedKind(String),

    /// Request named no symbols.
    #[error("subscription request has no symbols")]
    NoSymbols,

    /// Request named no kinds.
    #[error("subscription request has no data kinds")]
    NoKinds,

    /// Remote service rejected a subscribe action.
    #[error("subscription rejected ({code}): {message}")]
    Rejected {
        /// Response code from the server.
        code: i64,
        /// Error text from the server.
        message: String,
    },
}

// =============================================================================
// Subscription Request
// =============================================================================

/// An instrument set plus a data-kind set the caller wants streamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    symbols: Vec<String>,
    kinds: Vec<DataKind>,
}

impl SubscriptionRequest {
    /// Create a request from symbols and kinds.
    ///
    /// Symbols are trimmed, blanks dropped, duplicates collapsed.
    ///
    /// # Errors
    ///
    /// Returns an error if no symbols or no kinds remain.
    pub fn new<I, S>(symbols: I, kinds: &[DataKind]) -> Result<Self, SubscriptionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique_symbols: Vec<String> = Vec::new();
        for symbol in symbols {
            let symbol = symbol.as_ref().trim();
            if !symbol.is_empty() && !unique_symbols.iter().any(|s| s == symbol) {
                unique_symbols.push(symbol.to_string());
            }
        }

        let mut unique_kinds: Vec<DataKind> = Vec::new();
        for kind in kinds {
            if !unique_kinds.contains(kind) {
                unique_kinds.push(*kind);
            }
        }

        if unique_symbols.is_empty() {
            return Err(SubscriptionError::NoSymbols);
        }
        if unique_kinds.is_empty() {
            return Err(SubscriptionError::NoKinds);
        }

        Ok(Self {
            symbols: unique_symbols,
            kinds: unique_kinds,
        })
    }

    /// Parse the comma-joined wire form, e.g. `("AAPL$US,700$HK", "quote,tick")`.
    ///
    /// # Errors
    ///
    /// Returns an error for unrecognised kinds or empty lists.
    pub fn parse(symbols: &str, kinds: &str) -> Result<Self, SubscriptionError> {
        let kinds = DataKind::parse_list(kinds)?;
        Self::new(symbols.split(','), &kinds)
    }

    /// Check every kind against an allowed set.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::UnsupportedKind`] naming the first kind
    /// outside `allowed`.
    pub fn validate(&self, allowed: &[DataKind]) -> Result<(), SubscriptionError> {
        match self.kinds.iter().find(|k| !allowed.contains(k)) {
            Some(kind) => Err(SubscriptionError::UnsupportedKind(kind.to_string())),
            None => Ok(()),
        }
    }

    /// Requested symbols, in request order.
    #[must_use]
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Requested kinds, in request order.
    #[must_use]
    pub fn kinds(&self) -> &[DataKind] {
        &self.kinds
    }
}

// =============================================================================
// Subscription Set
// =============================================================================

/// Union of all subscription requests made over the client's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    symbols: Vec<String>,
    kinds: Vec<DataKind>,
}

impl SubscriptionSet {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            symbols: Vec::new(),
            kinds: Vec::new(),
        }
    }

    /// Check if nothing has been requested yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() || self.kinds.is_empty()
    }

    /// Merge a request into the union.
    ///
    /// Returns `true` if the union grew.
    pub fn merge(&mut self, request: &SubscriptionRequest) -> bool {
        let mut changed = false;

        for symbol in &request.symbols {
            if !self.symbols.contains(symbol) {
                self.symbols.push(symbol.clone());
                changed = true;
            }
        }
        for kind in &request.kinds {
            if !self.kinds.contains(kind) {
                self.kinds.push(*kind);
                changed = true;
            }
        }

        changed
    }

    /// Accumulated symbols, first-seen order.
    #[must_use]
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Accumulated kinds, first-seen order.
    #[must_use]
    pub fn kinds(&self) -> &[DataKind] {
        &self.kinds
    }

    /// Comma-joined symbols for the `params` field.
    #[must_use]
    pub fn symbols_param(&self) -> String {
        self.symbols.join(",")
    }

    /// Comma-joined kind tags for the `types` field.
    #[must_use]
    pub fn kinds_param(&self) -> String {
        self.kinds
            .iter()
            .map(DataKind::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("quote", DataKind::Quote ; "quote")]
    #[test_case("tick", DataKind::Tick ; "tick")]
    #[test_case("depth", DataKind::Depth ; "depth")]
    #[test_case("candle", DataKind::Candle ; "candle")]
    #[test_case("kline", DataKind::Candle ; "kline alias")]
    #[test_case(" Quote ", DataKind::Quote ; "trimmed and case insensitive")]
    fn data_kind_parses(input: &str, expected: DataKind) {
        assert_eq!(input.parse::<DataKind>().unwrap(), expected);
    }

    #[test]
    fn data_kind_rejects_unknown_tag() {
        let err = "trades".parse::<DataKind>().unwrap_err();
        assert_eq!(err, SubscriptionError::UnsupportedKind("trades".to_string()));
    }

    #[test]
    fn parse_list_skips_blanks() {
        let kinds = DataKind::parse_list("quote, ,depth,").unwrap();
        assert_eq!(kinds, vec![DataKind::Quote, DataKind::Depth]);
    }

    #[test]
    fn request_collapses_duplicates() {
        let request = SubscriptionRequest::new(
            ["BTCUSDT", " BTCUSDT", "ETHUSDT"],
            &[DataKind::Quote, DataKind::Quote],
        )
        .unwrap();
        assert_eq!(request.symbols(), ["BTCUSDT", "ETHUSDT"]);
        assert_eq!(request.kinds(), [DataKind::Quote]);
    }

    #[test]
    fn request_requires_symbols_and_kinds() {
        assert_eq!(
            SubscriptionRequest::new(Vec::<String>::new(), &[DataKind::Quote]),
            Err(SubscriptionError::NoSymbols)
        );
        assert_eq!(
            SubscriptionRequest::new(["  ", ""], &[DataKind::Quote]),
            Err(SubscriptionError::NoSymbols)
        );
        assert_eq!(
            SubscriptionRequest::new(["AAPL$US"], &[]),
            Err(SubscriptionError::NoKinds)
        );
    }

    #[test]
    fn request_parse_wire_form() {
        let request = SubscriptionRequest::parse("AAPL$US,700$HK", "quote,tick").unwrap();
        assert_eq!(request.symbols(), ["AAPL$US", "700$HK"]);
        assert_eq!(request.kinds(), [DataKind::Quote, DataKind::Tick]);
    }

    #[test]
    fn request_parse_rejects_unknown_kind() {
        let err = SubscriptionRequest::parse("AAPL$US", "quote,news").unwrap_err();
        assert_eq!(err, SubscriptionError::UnsupportedKind("news".to_string()));
    }

    #[test]
    fn request_validate_against_allowed_set() {
        let request =
            SubscriptionRequest::new(["EURUSD"], &[DataKind::Quote, DataKind::Depth]).unwrap();
        assert!(request.validate(DataKind::all()).is_ok());
        assert_eq!(
            request.validate(&[DataKind::Quote]),
            Err(SubscriptionError::UnsupportedKind("depth".to_string()))
        );
    }

    #[test]
    fn set_starts_empty() {
        let set = SubscriptionSet::new();
        assert!(set.is_empty());
        assert_eq!(set.symbols_param(), "");
        assert_eq!(set.kinds_param(), "");
    }

    #[test]
    fn set_merge_reports_growth() {
        let mut set = SubscriptionSet::new();
        let request = SubscriptionRequest::new(["BTCUSDT"], &[DataKind::Quote]).unwrap();

        assert!(set.merge(&request));
        assert!(!set.merge(&request));

        let wider = SubscriptionRequest::new(["ETHUSDT"], &[DataKind::Depth]).unwrap();
        assert!(set.merge(&wider));
        assert_eq!(set.symbols_param(), "BTCUSDT,ETHUSDT");
        assert_eq!(set.kinds_param(), "quote,depth");
    }

    fn symbol_strategy() -> impl Strategy<Value = String> {
        "[A-Z]{1,4}"
    }

    fn kind_strategy() -> impl Strategy<Value = DataKind> {
        prop::sample::select(DataKind::all().to_vec())
    }

    proptest! {
        #[test]
        fn merged_union_has_no_duplicates_and_keeps_first_seen_order(
            batches in prop::collection::vec(
                (prop::collection::vec(symbol_strategy(), 1..5), prop::collection::vec(kind_strategy(), 1..4)),
                1..8,
            )
        ) {
            let mut set = SubscriptionSet::new();
            let mut expected_symbols: Vec<String> = Vec::new();

            for (symbols, kinds) in &batches {
                let request = SubscriptionRequest::new(symbols, kinds).unwrap();
                set.merge(&request);
                for symbol in symbols {
                    if !expected_symbols.contains(symbol) {
                        expected_symbols.push(symbol.clone());
                    }
                }
            }

            prop_assert_eq!(set.symbols(), expected_symbols.as_slice());

            let mut kinds = set.kinds().to_vec();
            kinds.sort();
            kinds.dedup();
            prop_assert_eq!(kinds.len(), set.kinds().len());
        }

        #[test]
        fn merge_is_idempotent(
            symbols in prop::collection::vec(symbol_strategy(), 1..6),
            kinds in prop::collection::vec(kind_strategy(), 1..4),
        ) {
            let request = SubscriptionRequest::new(&symbols, &kinds).unwrap();
            let mut set = SubscriptionSet::new();
            set.merge(&request);
            let snapshot = set.clone();
            prop_assert!(!set.merge(&request));
            prop_assert_eq!(set, snapshot);
        }
    }
}
