//! Grant Models (优惠券发放 & 库存计数)
//!
//! A *grant* is one allocatable unit of a scarce resource. Two shapes share
//! the same lifecycle: a coupon-to-user row, and one unit inside a stock
//! counter. Lifecycle: AVAILABLE → RESERVED → CONSUMED, or RESERVED back to
//! AVAILABLE when a hold is compensated.

use serde::{Deserialize, Serialize};

/// Which grant table a reservation task points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum GrantKind {
    /// 优惠券发放记录（一行一张）
    Coupon,
    /// 库存计数器（available/locked 子计数）
    Stock,
}

impl std::fmt::Display for GrantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrantKind::Coupon => write!(f, "COUPON"),
            GrantKind::Stock => write!(f, "STOCK"),
        }
    }
}

/// Per-row grant status (coupon shape)
///
/// `New` 与 `Available` 都可被预留；其余转换由条件更新保证。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum GrantStatus {
    /// Freshly issued, never reserved
    New,
    /// Free to reserve (also the state a compensated hold returns to)
    Available,
    /// Held against an in-flight trade
    Reserved,
    /// Terminal: the resource is permanently spent
    Consumed,
}

impl GrantStatus {
    /// 是否允许进入 RESERVED
    pub fn is_reservable(&self) -> bool {
        matches!(self, GrantStatus::New | GrantStatus::Available)
    }
}

/// Coupon grant entity (一张发给某用户的券)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct CouponGrant {
    pub id: i64,
    pub coupon_id: i64,
    pub member_id: i64,
    pub status: GrantStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Stock counter entity (按 SKU 聚合的 available/locked 子计数)
///
/// Invariant: absent explicit replenishment, `available + locked` plus the
/// units already consumed is constant. Reserve moves one unit
/// available→locked; finalize burns a locked unit; compensation moves it
/// back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct StockCounter {
    pub sku_id: i64,
    pub available: i64,
    pub locked: i64,
    pub updated_at: i64,
}
