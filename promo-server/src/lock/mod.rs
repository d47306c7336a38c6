//! 分布式互斥量
//!
//! 基于共享 KV 存储的互斥锁：
//!
//! - 获取 = 原子 set-if-absent-with-TTL，每次尝试生成全新随机持有者令牌
//! - 释放 = 脚本化 check-and-delete，令牌不匹配即 no-op（TTL 过期后被
//!   他人重新获取的锁，原持有者无法误释放）
//! - [`LockManager::run_exclusive`] 在成功、业务错误、panic 三种退出
//!   路径上都保证释放
//!
//! 存储连接失败一律视为"获取失败"，不会演变成无界重试。

mod retry;
mod store;

pub use retry::RetryPolicy;
pub use store::{LockStore, LockStoreError, MemoryLockStore, RedisLockStore};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use thiserror::Error;
use uuid::Uuid;

/// 锁获取错误（与被保护动作的失败可区分）
#[derive(Error, Debug)]
pub enum LockError {
    #[error("failed to acquire lock '{key}'")]
    Unavailable { key: String },

    #[error(transparent)]
    Store(#[from] LockStoreError),
}

/// `run_exclusive` 的复合错误：锁获取失败 vs 动作自身失败
#[derive(Error, Debug)]
pub enum ExclusiveError<E> {
    #[error("lock acquisition failed: {0}")]
    Lock(#[from] LockError),

    #[error("guarded action failed: {0}")]
    Action(E),
}

/// 成功获取的锁凭据；释放时必须出示匹配令牌
#[derive(Debug)]
pub struct LockGuard {
    key: String,
    token: String,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// 分布式锁管理器
pub struct LockManager {
    store: Arc<dyn LockStore>,
}

impl LockManager {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self { store }
    }

    /// 单次尝试获取；`None` 表示锁被他人持有
    pub async fn try_acquire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<LockGuard>, LockStoreError> {
        // 每次尝试一个全新令牌
        let token = Uuid::new_v4().simple().to_string();
        if self.store.set_nx_px(key, &token, ttl).await? {
            Ok(Some(LockGuard {
                key: key.to_string(),
                token,
            }))
        } else {
            Ok(None)
        }
    }

    /// 按策略重试获取
    ///
    /// 存储错误立即中止（映射为 [`LockError::Store`]），竞争失败按
    /// 策略重试直至放弃。
    pub async fn acquire(
        &self,
        key: &str,
        ttl: Duration,
        policy: RetryPolicy,
    ) -> Result<LockGuard, LockError> {
        let deadline = policy.deadline_timeout().map(|t| Instant::now() + t);
        let mut attempt: u32 = 0;
        loop {
            if let Some(guard) = self.try_acquire(key, ttl).await? {
                return Ok(guard);
            }
            let Some(delay) = policy.next_delay(attempt) else {
                break;
            };
            if let Some(deadline) = deadline {
                if Instant::now() + delay >= deadline {
                    break;
                }
            }
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
        Err(LockError::Unavailable {
            key: key.to_string(),
        })
    }

    /// 释放锁；令牌不匹配（过期后易主）时为 no-op，返回是否真正删除
    pub async fn release(&self, guard: LockGuard) -> Result<bool, LockStoreError> {
        self.store.del_if_match(&guard.key, &guard.token).await
    }

    /// 获取锁、执行动作、所有退出路径上释放
    ///
    /// 动作 panic 时先释放再继续 unwind；释放自身失败仅记录日志，
    /// 由 TTL 过期兜底。
    pub async fn run_exclusive<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        policy: RetryPolicy,
        action: F,
    ) -> Result<T, ExclusiveError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let guard = self.acquire(key, ttl, policy).await?;
        let outcome = AssertUnwindSafe(action()).catch_unwind().await;
        if let Err(e) = self.release(guard).await {
            tracing::warn!(key, error = %e, "lock release failed; ttl expiry will reclaim");
        }
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ExclusiveError::Action(e)),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn manager() -> LockManager {
        LockManager::new(Arc::new(MemoryLockStore::new()))
    }

    #[tokio::test]
    async fn test_contention_single_winner() {
        let mgr = Arc::new(manager());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let mgr = mgr.clone();
            handles.push(tokio::spawn(async move {
                mgr.try_acquire("hot", Duration::from_secs(5)).await.unwrap()
            }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_release_then_reacquire() {
        let mgr = manager();
        let guard = mgr
            .try_acquire("k", Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        assert!(mgr.try_acquire("k", Duration::from_secs(5)).await.unwrap().is_none());
        assert!(mgr.release(guard).await.unwrap());
        assert!(mgr.try_acquire("k", Duration::from_secs(5)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ttl_expiry_reacquirable_without_release() {
        let mgr = manager();
        let _guard = mgr
            .try_acquire("k", Duration::from_millis(20))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(mgr.try_acquire("k", Duration::from_secs(5)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_acquire_retries_until_holder_releases() {
        let store = Arc::new(MemoryLockStore::new());
        let mgr = Arc::new(LockManager::new(store));
        let guard = mgr
            .try_acquire("k", Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();

        let holder = mgr.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            holder.release(guard).await.unwrap();
        });

        let acquired = mgr
            .acquire(
                "k",
                Duration::from_secs(5),
                RetryPolicy::Fixed {
                    attempts: 20,
                    interval: Duration::from_millis(20),
                },
            )
            .await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_run_exclusive_releases_on_action_error() {
        let mgr = manager();
        let result: Result<(), ExclusiveError<&str>> = mgr
            .run_exclusive("k", Duration::from_secs(5), RetryPolicy::None, || async {
                Err("boom")
            })
            .await;
        assert!(matches!(result, Err(ExclusiveError::Action("boom"))));
        // 动作失败后锁已释放
        assert!(mgr.try_acquire("k", Duration::from_secs(5)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_run_exclusive_lock_failure_is_distinct() {
        let mgr = manager();
        let _held = mgr
            .try_acquire("k", Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        let result: Result<(), ExclusiveError<&str>> = mgr
            .run_exclusive("k", Duration::from_secs(5), RetryPolicy::None, || async {
                Ok(())
            })
            .await;
        assert!(matches!(
            result,
            Err(ExclusiveError::Lock(LockError::Unavailable { .. }))
        ));
    }

    /// 连接失败的存储：统计调用次数，验证不重试
    struct FailingStore {
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl LockStore for FailingStore {
        async fn set_nx_px(
            &self,
            _key: &str,
            _token: &str,
            _ttl: Duration,
        ) -> Result<bool, LockStoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(LockStoreError::Connection("connection refused".into()))
        }

        async fn del_if_match(&self, _key: &str, _token: &str) -> Result<bool, LockStoreError> {
            Err(LockStoreError::Connection("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_store_error_aborts_without_retrying() {
        let store = Arc::new(FailingStore {
            calls: AtomicU32::new(0),
        });
        let mgr = LockManager::new(store.clone());
        let result = mgr
            .acquire(
                "k",
                Duration::from_secs(5),
                RetryPolicy::Fixed {
                    attempts: 10,
                    interval: Duration::from_millis(1),
                },
            )
            .await;
        assert!(matches!(result, Err(LockError::Store(_))));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }
}
