//! Shared types for the Promo coordination services
//!
//! Common types used across the promo service crates and by callers:
//! domain models (grants, reservation tasks), the signed-RPC header
//! contract, and utility types.

pub mod models;
pub mod rpc;
pub mod types;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Model re-exports (for convenient access)
pub use models::{CouponGrant, GrantKind, GrantStatus, ReservationTask, StockCounter, TaskState};
