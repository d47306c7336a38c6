//! Domain models shared across the promo services

mod grant;
mod task;

pub use grant::{CouponGrant, GrantKind, GrantStatus, StockCounter};
pub use task::{ReservationTask, TaskState};
