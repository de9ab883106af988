//! Application Services
//!
//! Services that sit between the connection manager and caller code.
//!
//! - `DispatchRegistry`: per-kind handler lists and fan-out of decoded events

pub mod dispatch;
