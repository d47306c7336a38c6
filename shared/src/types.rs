//! Common types for the shared crate
//!
//! Utility types used across the promo services

/// Timestamp type (Unix milliseconds)
pub type Timestamp = i64;

/// Opaque external trade reference (order number of the calling service)
pub type TradeRef = String;
