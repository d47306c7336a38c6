//! 锁存储后端
//!
//! 分布式互斥量依赖共享 KV 存储的两个原子原语：
//!
//! - `SET key token NX PX ttl`: 不存在才写入，带毫秒级过期
//! - Lua 脚本化的 check-and-delete: 值仍等于持有者令牌才删除
//!
//! [`RedisLockStore`] 是生产实现；[`MemoryLockStore`] 供测试与单进程
//! 部署，语义一致（含 TTL 惰性过期）。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// 存储层错误：连接类与其他后端错误分开映射
#[derive(Error, Debug)]
pub enum LockStoreError {
    #[error("lock store unreachable: {0}")]
    Connection(String),

    #[error("lock store operation failed: {0}")]
    Backend(String),
}

/// 共享 KV 存储的锁原语
#[async_trait]
pub trait LockStore: Send + Sync + 'static {
    /// 原子 set-if-absent-with-TTL；key 原先不存在返回 true
    async fn set_nx_px(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, LockStoreError>;

    /// 原子 check-and-delete；仅当存储值等于 token 才删除，返回是否删除
    async fn del_if_match(&self, key: &str, token: &str) -> Result<bool, LockStoreError>;
}

// ============================================================================
// Redis 实现
// ============================================================================

const DEL_IF_MATCH_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
  return redis.call("DEL", KEYS[1])
else
  return 0
end
"#;

/// Redis 锁存储（多路复用 tokio 连接，可并发共享）
#[derive(Clone)]
pub struct RedisLockStore {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisLockStore {
    /// 连接并验证可达性
    pub async fn connect(url: &str) -> Result<Self, LockStoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| LockStoreError::Connection(e.to_string()))?;
        let mut conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(map_redis_err)?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn set_nx_px(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, LockStoreError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;
        Ok(reply.is_some())
    }

    async fn del_if_match(&self, key: &str, token: &str) -> Result<bool, LockStoreError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = redis::cmd("EVAL")
            .arg(DEL_IF_MATCH_SCRIPT)
            .arg(1)
            .arg(key)
            .arg(token)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;
        Ok(deleted == 1)
    }
}

fn map_redis_err(e: redis::RedisError) -> LockStoreError {
    if e.is_io_error() || e.is_timeout() || e.is_connection_refusal() || e.is_connection_dropped() {
        LockStoreError::Connection(e.to_string())
    } else {
        LockStoreError::Backend(e.to_string())
    }
}

// ============================================================================
// 内存实现 (测试 / 单进程)
// ============================================================================

/// In-process lock store with the same NX/PX + CAS-delete semantics
#[derive(Default)]
pub struct MemoryLockStore {
    // key -> (token, expires_at)
    entries: DashMap<String, (String, Instant)>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn set_nx_px(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, LockStoreError> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().1 <= now {
                    // 惰性过期：视同不存在
                    occupied.insert((token.to_string(), now + ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert((token.to_string(), now + ttl));
                Ok(true)
            }
        }
    }

    async fn del_if_match(&self, key: &str, token: &str) -> Result<bool, LockStoreError> {
        let now = Instant::now();
        let removed = self
            .entries
            .remove_if(key, |_, (stored, expires_at)| {
                stored == token && *expires_at > now
            });
        Ok(removed.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_nx_second_writer_loses() {
        let store = MemoryLockStore::new();
        assert!(store
            .set_nx_px("k", "a", Duration::from_secs(5))
            .await
            .unwrap());
        assert!(!store
            .set_nx_px("k", "b", Duration::from_secs(5))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_expired_key_reacquirable() {
        let store = MemoryLockStore::new();
        assert!(store
            .set_nx_px("k", "a", Duration::from_millis(20))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store
            .set_nx_px("k", "b", Duration::from_secs(5))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_del_requires_matching_token() {
        let store = MemoryLockStore::new();
        store
            .set_nx_px("k", "a", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!store.del_if_match("k", "other").await.unwrap());
        assert!(store.del_if_match("k", "a").await.unwrap());
        // 已删除后再删是 no-op
        assert!(!store.del_if_match("k", "a").await.unwrap());
    }
}
