//! Reservation Task Repository
//!
//! 任务行只增不删（审计痕迹）；状态迁移全部走条件更新，
//! LOCKED → FINISHED / CANCELLED 一旦落定不再改写。

use shared::models::{GrantKind, ReservationTask};
use sqlx::{Sqlite, SqlitePool, Transaction};

const SELECT_COLUMNS: &str =
    "id, grant_kind, grant_ref, trade_ref, state, created_at, expires_at";

/// 预留事务内插入任务行
pub async fn insert(
    tx: &mut Transaction<'_, Sqlite>,
    task: &ReservationTask,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO reservation_task (id, grant_kind, grant_ref, trade_ref, state, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(task.id)
    .bind(task.grant_kind)
    .bind(task.grant_ref)
    .bind(&task.trade_ref)
    .bind(task.state)
    .bind(task.created_at)
    .bind(task.expires_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<ReservationTask>, sqlx::Error> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM reservation_task WHERE id = ?1");
    sqlx::query_as::<_, ReservationTask>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// LOCKED → FINISHED；返回是否赢得该迁移
pub async fn mark_finished(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE reservation_task SET state = 'FINISHED' WHERE id = ?1 AND state = 'LOCKED'")
            .bind(id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() == 1)
}

/// LOCKED → CANCELLED；返回是否赢得该迁移
pub async fn mark_cancelled(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE reservation_task SET state = 'CANCELLED' WHERE id = ?1 AND state = 'LOCKED'")
            .bind(id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() == 1)
}

/// 兜底扫描：指定类型下已过期仍 LOCKED 的任务
pub async fn find_expired_locked(
    pool: &SqlitePool,
    kind: GrantKind,
    now: i64,
    limit: i64,
) -> Result<Vec<ReservationTask>, sqlx::Error> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM reservation_task
         WHERE grant_kind = ?1 AND state = 'LOCKED' AND expires_at <= ?2
         ORDER BY expires_at LIMIT ?3"
    );
    sqlx::query_as::<_, ReservationTask>(&sql)
        .bind(kind)
        .bind(now)
        .bind(limit)
        .fetch_all(pool)
        .await
}
