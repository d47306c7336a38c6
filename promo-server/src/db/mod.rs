//! 数据库层：SQLite 连接池与内嵌 schema
//!
//! 预留路径只依赖两种能力：条件更新返回受影响行数、事务回滚。
//! 任务表带 (state, expires_at) 索引供兜底扫描使用。

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS coupon_grant (
        id INTEGER PRIMARY KEY,
        coupon_id INTEGER NOT NULL,
        member_id INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'NEW',
        created_at INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS stock_counter (
        sku_id INTEGER PRIMARY KEY,
        available INTEGER NOT NULL DEFAULT 0,
        locked INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS reservation_task (
        id INTEGER PRIMARY KEY,
        grant_kind TEXT NOT NULL,
        grant_ref INTEGER NOT NULL,
        trade_ref TEXT NOT NULL,
        state TEXT NOT NULL DEFAULT 'LOCKED',
        created_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_reservation_task_sweep
        ON reservation_task (state, expires_at)",
];

/// 连接并初始化 schema
pub async fn connect(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// 执行内嵌建表语句（幂等）
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// 进程内存库（测试与本地开发）
///
/// 单连接：`sqlite::memory:` 下多个连接各见各的库。
pub async fn memory_pool() -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_schema(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_idempotent() {
        let pool = memory_pool().await.unwrap();
        // 重复初始化不报错
        init_schema(&pool).await.unwrap();
        sqlx::query("INSERT INTO stock_counter (sku_id, available) VALUES (1, 10)")
            .execute(&pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_connect_creates_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/promo.db?mode=rwc", dir.path().display());
        let pool = connect(&url).await.unwrap();
        sqlx::query("INSERT INTO coupon_grant (id, coupon_id, member_id) VALUES (1, 1, 1)")
            .execute(&pool)
            .await
            .unwrap();
    }
}
