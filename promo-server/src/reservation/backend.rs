//! Grant 后端：同一预留模式的两种落地
//!
//! - [`CouponGrants`]: 一行一张券的状态机 (NEW/AVAILABLE → RESERVED →
//!   CONSUMED，补偿回 AVAILABLE)
//! - [`StockCounters`]: 按 SKU 的 available/locked 子计数，预留即
//!   available→locked 挪一个单位
//!
//! 两者都靠条件更新 + 受影响行数判定，不依赖全局串行；同一行上
//! 预留路径与对账路径不会朝冲突方向并发改写（改前先查状态）。

use async_trait::async_trait;
use shared::models::GrantKind;
use sqlx::{Sqlite, SqlitePool, Transaction};

/// 预留引擎依赖的 grant 操作面
#[async_trait]
pub trait GrantBackend: Send + Sync {
    fn kind(&self) -> GrantKind;

    /// 条件批量预留；返回实际转入 RESERVED 的行数
    ///
    /// 调用方核对返回值与请求数量，不等则整体回滚。
    async fn reserve(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        grant_ids: &[i64],
        now: i64,
    ) -> Result<u64, sqlx::Error>;

    /// RESERVED → 终态消耗；返回是否有行被更新
    async fn consume(&self, pool: &SqlitePool, grant_ref: i64, now: i64)
        -> Result<bool, sqlx::Error>;

    /// RESERVED → 回到可用；返回是否有行被更新
    async fn release(&self, pool: &SqlitePool, grant_ref: i64, now: i64)
        -> Result<bool, sqlx::Error>;
}

// ============================================================================
// 优惠券（一行一张）
// ============================================================================

pub struct CouponGrants;

#[async_trait]
impl GrantBackend for CouponGrants {
    fn kind(&self) -> GrantKind {
        GrantKind::Coupon
    }

    async fn reserve(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        grant_ids: &[i64],
        now: i64,
    ) -> Result<u64, sqlx::Error> {
        if grant_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = (0..grant_ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE coupon_grant SET status = 'RESERVED', updated_at = ?1
             WHERE status IN ('NEW', 'AVAILABLE') AND id IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql).bind(now);
        for id in grant_ids {
            query = query.bind(id);
        }
        let result = query.execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }

    async fn consume(
        &self,
        pool: &SqlitePool,
        grant_ref: i64,
        now: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE coupon_grant SET status = 'CONSUMED', updated_at = ?1
             WHERE id = ?2 AND status = 'RESERVED'",
        )
        .bind(now)
        .bind(grant_ref)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release(
        &self,
        pool: &SqlitePool,
        grant_ref: i64,
        now: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE coupon_grant SET status = 'AVAILABLE', updated_at = ?1
             WHERE id = ?2 AND status = 'RESERVED'",
        )
        .bind(now)
        .bind(grant_ref)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

// ============================================================================
// 库存（available/locked 计数）
// ============================================================================

pub struct StockCounters;

#[async_trait]
impl GrantBackend for StockCounters {
    fn kind(&self) -> GrantKind {
        GrantKind::Stock
    }

    /// `grant_ids` 中同一 SKU 出现几次就预留几个单位
    async fn reserve(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        grant_ids: &[i64],
        now: i64,
    ) -> Result<u64, sqlx::Error> {
        let mut changed = 0u64;
        for sku_id in grant_ids {
            let result = sqlx::query(
                "UPDATE stock_counter
                 SET available = available - 1, locked = locked + 1, updated_at = ?1
                 WHERE sku_id = ?2 AND available >= 1",
            )
            .bind(now)
            .bind(sku_id)
            .execute(&mut **tx)
            .await?;
            changed += result.rows_affected();
        }
        Ok(changed)
    }

    async fn consume(
        &self,
        pool: &SqlitePool,
        grant_ref: i64,
        now: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE stock_counter SET locked = locked - 1, updated_at = ?1
             WHERE sku_id = ?2 AND locked >= 1",
        )
        .bind(now)
        .bind(grant_ref)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release(
        &self,
        pool: &SqlitePool,
        grant_ref: i64,
        now: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE stock_counter
             SET available = available + 1, locked = locked - 1, updated_at = ?1
             WHERE sku_id = ?2 AND locked >= 1",
        )
        .bind(now)
        .bind(grant_ref)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn seed_coupons(pool: &SqlitePool, n: i64) {
        for id in 1..=n {
            sqlx::query(
                "INSERT INTO coupon_grant (id, coupon_id, member_id, status) VALUES (?1, 100, 7, 'AVAILABLE')",
            )
            .bind(id)
            .execute(pool)
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_coupon_reserve_counts_only_reservable_rows() {
        let pool = db::memory_pool().await.unwrap();
        seed_coupons(&pool, 2).await;
        // 其中一张已被消耗
        sqlx::query("UPDATE coupon_grant SET status = 'CONSUMED' WHERE id = 2")
            .execute(&pool)
            .await
            .unwrap();

        let backend = CouponGrants;
        let mut tx = pool.begin().await.unwrap();
        let changed = backend.reserve(&mut tx, &[1, 2], 1_000).await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(changed, 1);
    }

    #[tokio::test]
    async fn test_coupon_consume_requires_reserved() {
        let pool = db::memory_pool().await.unwrap();
        seed_coupons(&pool, 1).await;
        let backend = CouponGrants;
        // AVAILABLE 状态不可直接消耗
        assert!(!backend.consume(&pool, 1, 1_000).await.unwrap());

        let mut tx = pool.begin().await.unwrap();
        backend.reserve(&mut tx, &[1], 1_000).await.unwrap();
        tx.commit().await.unwrap();
        assert!(backend.consume(&pool, 1, 2_000).await.unwrap());
        // 已消耗后再消耗 / 释放均为 no-op
        assert!(!backend.consume(&pool, 1, 3_000).await.unwrap());
        assert!(!backend.release(&pool, 1, 3_000).await.unwrap());
    }

    #[tokio::test]
    async fn test_stock_reserve_moves_available_to_locked() {
        let pool = db::memory_pool().await.unwrap();
        sqlx::query("INSERT INTO stock_counter (sku_id, available) VALUES (5, 3)")
            .execute(&pool)
            .await
            .unwrap();

        let backend = StockCounters;
        let mut tx = pool.begin().await.unwrap();
        // 同一 SKU 两个单位
        let changed = backend.reserve(&mut tx, &[5, 5], 1_000).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(changed, 2);

        let counter: shared::models::StockCounter =
            sqlx::query_as("SELECT sku_id, available, locked, updated_at FROM stock_counter WHERE sku_id = 5")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(counter.available, 1);
        assert_eq!(counter.locked, 2);
    }

    #[tokio::test]
    async fn test_stock_reserve_stops_at_zero_available() {
        let pool = db::memory_pool().await.unwrap();
        sqlx::query("INSERT INTO stock_counter (sku_id, available) VALUES (5, 1)")
            .execute(&pool)
            .await
            .unwrap();

        let backend = StockCounters;
        let mut tx = pool.begin().await.unwrap();
        let changed = backend.reserve(&mut tx, &[5, 5], 1_000).await.unwrap();
        tx.rollback().await.unwrap();
        // 只有一个单位可挪
        assert_eq!(changed, 1);
    }

    #[tokio::test]
    async fn test_stock_release_restores_available() {
        let pool = db::memory_pool().await.unwrap();
        sqlx::query("INSERT INTO stock_counter (sku_id, available) VALUES (5, 1)")
            .execute(&pool)
            .await
            .unwrap();
        let backend = StockCounters;
        let mut tx = pool.begin().await.unwrap();
        backend.reserve(&mut tx, &[5], 1_000).await.unwrap();
        tx.commit().await.unwrap();

        assert!(backend.release(&pool, 5, 2_000).await.unwrap());
        let counter: shared::models::StockCounter =
            sqlx::query_as("SELECT sku_id, available, locked, updated_at FROM stock_counter WHERE sku_id = 5")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(counter.available, 1);
        assert_eq!(counter.locked, 0);
        // locked 已空，重复释放为 no-op
        assert!(!backend.release(&pool, 5, 3_000).await.unwrap());
    }
}
