//! 预留-释放引擎
//!
//! # 控制流
//!
//! ```text
//! reserve(N 个 grant, trade_ref)
//!   ├─ 事务: 条件批量 RESERVED, 行数不符 → 回滚 + 业务错误
//!   ├─ 事务: 每个 grant 插入一条 LOCKED 任务 (expires_at = now + 持有窗口)
//!   ├─ commit
//!   └─ 每个任务发一条延迟消息 (ttl = 持有窗口)      ← 与 commit 不原子
//!
//! reconcile(task_id)                                  ← 延迟到期触发
//!   ├─ 任务已终态 → AlreadySettled (幂等确认)
//!   └─ 查权威订单状态 (签名 RPC)
//!        ├─ PENDING        → Retry (交给 broker 有界重投)
//!        ├─ PAID           → 任务 FINISHED, grant 永久消耗
//!        └─ 其他 / 查询失败 → 任务 CANCELLED, grant 回到可用
//! ```
//!
//! commit 与消息发布之间的崩溃窗口由 [`超时兜底`](Self::compensate_expired)
//! 补偿。这是对"资源库与消息中间件之间没有分布式事务"的既定容错模型。

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use thiserror::Error;

use shared::models::{ReservationTask, TaskState};

use crate::broker::{BrokerError, DelayBroker, ReleaseMessage};
use crate::idgen::{Snowflake, SnowflakeError};
use crate::lock::{ExclusiveError, LockManager, RetryPolicy};

use super::backend::GrantBackend;
use super::order_status::{OrderStatus, OrderStatusSource};
use super::tasks;

/// 默认持有窗口（30 分钟）
pub const DEFAULT_HOLD_WINDOW: Duration = Duration::from_secs(30 * 60);

/// 热点键串行化时的锁 TTL
const HOT_KEY_LOCK_TTL: Duration = Duration::from_secs(10);

/// Saga 错误
#[derive(Error, Debug)]
pub enum SagaError {
    /// 可预留数量不足：整批中止，零预留落库
    #[error("insufficient availability: wanted {wanted}, only {reserved} reservable")]
    InsufficientAvailability { wanted: usize, reserved: u64 },

    #[error("reservation task {0} not found")]
    TaskNotFound(i64),

    #[error("id allocation failed: {0}")]
    IdAllocation(#[from] SnowflakeError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),
}

/// 单次对账的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 任务已终态；重复投递直接确认
    AlreadySettled,
    /// 订单未决；等待重投后再对账
    Retry,
    /// 支付成功；资源永久消耗
    Finished,
    /// 已补偿；资源回到可用
    Cancelled,
}

/// 预留-释放引擎（券 / 库存各一实例，模式相同）
pub struct ReservationEngine {
    pool: SqlitePool,
    backend: Arc<dyn GrantBackend>,
    broker: Arc<dyn DelayBroker>,
    orders: Arc<dyn OrderStatusSource>,
    ids: Arc<Snowflake>,
    hold_window: Duration,
}

impl ReservationEngine {
    pub fn new(
        pool: SqlitePool,
        backend: Arc<dyn GrantBackend>,
        broker: Arc<dyn DelayBroker>,
        orders: Arc<dyn OrderStatusSource>,
        ids: Arc<Snowflake>,
    ) -> Self {
        Self {
            pool,
            backend,
            broker,
            orders,
            ids,
            hold_window: DEFAULT_HOLD_WINDOW,
        }
    }

    /// 覆盖持有窗口（测试用短窗口）
    pub fn with_hold_window(mut self, hold_window: Duration) -> Self {
        self.hold_window = hold_window;
        self
    }

    pub fn kind(&self) -> shared::models::GrantKind {
        self.backend.kind()
    }

    /// 预留一批 grant，绑定外部交易号；返回任务 id
    ///
    /// 实际预留行数与请求不符时整体回滚，不留部分预留。
    pub async fn reserve(
        &self,
        grant_ids: &[i64],
        trade_ref: &str,
    ) -> Result<Vec<i64>, SagaError> {
        if grant_ids.is_empty() {
            return Ok(Vec::new());
        }
        let now = shared::util::now_millis();
        let expires_at = now + self.hold_window.as_millis() as i64;

        let mut tx = self.pool.begin().await?;
        let changed = self.backend.reserve(&mut tx, grant_ids, now).await?;
        if changed != grant_ids.len() as u64 {
            tx.rollback().await?;
            return Err(SagaError::InsufficientAvailability {
                wanted: grant_ids.len(),
                reserved: changed,
            });
        }

        let mut task_ids = Vec::with_capacity(grant_ids.len());
        for &grant_ref in grant_ids {
            let task = ReservationTask {
                id: self.ids.next()?,
                grant_kind: self.backend.kind(),
                grant_ref,
                trade_ref: trade_ref.to_string(),
                state: TaskState::Locked,
                created_at: now,
                expires_at,
            };
            tasks::insert(&mut tx, &task).await?;
            task_ids.push(task.id);
        }
        tx.commit().await?;

        // commit 之后逐条发布延迟消息；中途崩溃留下的 LOCKED 任务
        // 由到期兜底扫描补偿
        for &task_id in &task_ids {
            self.broker
                .publish_delayed(
                    ReleaseMessage {
                        task_id,
                        kind: self.backend.kind(),
                    },
                    self.hold_window,
                )
                .await?;
        }

        tracing::info!(
            kind = %self.backend.kind(),
            count = task_ids.len(),
            trade_ref,
            "reserved grants"
        );
        Ok(task_ids)
    }

    /// 热点键串行化的预留：同 key 的并发请求逐个过临界区
    pub async fn reserve_exclusive(
        &self,
        lock: &LockManager,
        lock_key: &str,
        policy: RetryPolicy,
        grant_ids: &[i64],
        trade_ref: &str,
    ) -> Result<Vec<i64>, ExclusiveError<SagaError>> {
        lock.run_exclusive(lock_key, HOT_KEY_LOCK_TTL, policy, || {
            self.reserve(grant_ids, trade_ref)
        })
        .await
    }

    /// 对账一个任务（延迟消息到期 / 重投触发）
    ///
    /// 幂等：任务已终态直接确认；终态迁移靠条件更新竞争，输掉的
    /// 并发对账同样视为已处理。
    pub async fn reconcile(&self, task_id: i64) -> Result<Outcome, SagaError> {
        let Some(task) = tasks::find(&self.pool, task_id).await? else {
            return Err(SagaError::TaskNotFound(task_id));
        };
        if task.state.is_terminal() {
            tracing::debug!(task_id, state = ?task.state, "task already settled");
            return Ok(Outcome::AlreadySettled);
        }

        let status = match self.orders.status(&task.trade_ref).await {
            Ok(status) => status,
            Err(e) => {
                // 查询失败按非支付终局处理：宁可释放资源，不让预留悬死
                tracing::warn!(task_id, trade_ref = %task.trade_ref, error = %e,
                    "order status query failed; compensating");
                return self.compensate(&task).await;
            }
        };

        match status {
            OrderStatus::Pending => Ok(Outcome::Retry),
            OrderStatus::Paid => {
                if tasks::mark_finished(&self.pool, task.id).await? {
                    let now = shared::util::now_millis();
                    if !self.backend.consume(&self.pool, task.grant_ref, now).await? {
                        tracing::error!(
                            task_id,
                            grant_ref = task.grant_ref,
                            "task finished but grant was not in reserved state"
                        );
                    }
                    tracing::info!(task_id, trade_ref = %task.trade_ref, "reservation finalized");
                    Ok(Outcome::Finished)
                } else {
                    Ok(Outcome::AlreadySettled)
                }
            }
            OrderStatus::Cancelled | OrderStatus::NotFound => self.compensate(&task).await,
        }
    }

    /// 补偿：任务 CANCELLED，grant 回到可用
    async fn compensate(&self, task: &ReservationTask) -> Result<Outcome, SagaError> {
        if tasks::mark_cancelled(&self.pool, task.id).await? {
            let now = shared::util::now_millis();
            if !self.backend.release(&self.pool, task.grant_ref, now).await? {
                tracing::error!(
                    task_id = task.id,
                    grant_ref = task.grant_ref,
                    "task cancelled but grant was not in reserved state"
                );
            }
            tracing::info!(task_id = task.id, trade_ref = %task.trade_ref, "reservation compensated");
            Ok(Outcome::Cancelled)
        } else {
            Ok(Outcome::AlreadySettled)
        }
    }

    /// 兜底：强制补偿已过期仍 LOCKED 的任务；返回补偿条数
    ///
    /// 与延迟消息是否送达无关。这是 commit/publish 非原子性的
    /// 唯一安全网，必须独立周期运行。
    pub async fn compensate_expired(&self, limit: i64) -> Result<usize, SagaError> {
        let now = shared::util::now_millis();
        let expired =
            tasks::find_expired_locked(&self.pool, self.backend.kind(), now, limit).await?;
        let mut compensated = 0;
        for task in expired {
            if matches!(self.compensate(&task).await?, Outcome::Cancelled) {
                compensated += 1;
            }
        }
        Ok(compensated)
    }
}
