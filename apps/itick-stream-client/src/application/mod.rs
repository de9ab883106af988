//! Application Layer - Ports and services.
//!
//! This layer contains the port interfaces the connection manager drives and
//! the services that sit between decoded events and caller code.

/// Port interfaces for external systems (physical transport).
pub mod ports;

/// Application services (event dispatch).
pub mod services;
