//! 延迟消息 (延迟队列 / 死信路由)
//!
//! # 拓扑
//!
//! ```text
//! reserve ──▶ publish_delayed(ttl=持有窗口) ──▶ [延迟队列]
//!                                                  │ ttl 到期 (死信)
//!                                                  ▼
//!                                            [释放队列] ──▶ ReleaseConsumer
//!                                                  ▲
//!              redeliver(有界重投) ────────────────┘
//! ```
//!
//! [`MemoryDelayBroker`] 用进程内定时器复刻消息级 TTL + 死信语义：
//! 没有等价 broker 能力的平台必须自建这样的显式有界重投调度器，
//! 才能保住"最终对账"承诺。

mod memory;

pub use memory::MemoryDelayBroker;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::models::GrantKind;
use thiserror::Error;

/// 释放队列消息：延迟到期后触发一次对账
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMessage {
    pub task_id: i64,
    pub kind: GrantKind,
}

/// 一次投递（带第几次尝试，重投计数用）
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: ReleaseMessage,
    pub attempt: u32,
}

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("release channel closed")]
    ChannelClosed,
}

/// 延迟消息代理
#[async_trait]
pub trait DelayBroker: Send + Sync {
    /// 延迟 `ttl` 后投递到释放队列（首次投递，attempt=1）
    async fn publish_delayed(
        &self,
        message: ReleaseMessage,
        ttl: Duration,
    ) -> Result<(), BrokerError>;

    /// 对账未决时的重投；`attempt` 由消费者递增并设上限
    async fn redeliver(
        &self,
        message: ReleaseMessage,
        attempt: u32,
        delay: Duration,
    ) -> Result<(), BrokerError>;
}
