//! Domain Layer - Market data and subscription types.
//!
//! This layer contains the core domain types for market data streaming
//! with no I/O dependencies. All types here are pure Rust with
//! serialization support.

/// Decoded market data events (quotes, trades, depth, candles).
pub mod market_data;

/// Data kinds, subscription requests and the accumulated subscription union.
pub mod subscription;
