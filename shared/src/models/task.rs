//! Reservation Task Model (预留任务)
//!
//! One task per reserved grant per external trade. Tasks are created at
//! reservation time, mutated only by the reconciliation path, and never
//! deleted: they are the audit trail of every hold.

use serde::{Deserialize, Serialize};

use super::GrantKind;

/// Task state; transitions are monotonic terminal
///
/// LOCKED → FINISHED 或 LOCKED → CANCELLED，终态不再变化。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum TaskState {
    /// Hold in flight, outcome unknown
    Locked,
    /// Trade paid; the grant stays consumed
    Finished,
    /// Compensated; the grant went back to available
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Locked)
    }
}

/// Reservation task entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ReservationTask {
    /// Snowflake id issued by the allocator
    pub id: i64,
    pub grant_kind: GrantKind,
    /// Coupon grant row id, or SKU id for stock holds
    pub grant_ref: i64,
    /// External trade reference (opaque to this service)
    pub trade_ref: String,
    pub state: TaskState,
    pub created_at: i64,
    /// 超过该时刻仍处于 LOCKED 的任务由兜底扫描强制补偿
    pub expires_at: i64,
}

impl ReservationTask {
    /// 是否已过期（仍需结合 state 判断）
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TaskState::Locked.is_terminal());
        assert!(TaskState::Finished.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
    }

    #[test]
    fn test_expiry_check() {
        let task = ReservationTask {
            id: 1,
            grant_kind: GrantKind::Coupon,
            grant_ref: 10,
            trade_ref: "T1".into(),
            state: TaskState::Locked,
            created_at: 1_000,
            expires_at: 2_000,
        };
        assert!(!task.is_expired(1_999));
        assert!(task.is_expired(2_000));
    }
}
