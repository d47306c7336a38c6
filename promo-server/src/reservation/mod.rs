//! 预留-释放 Saga
//!
//! 稀缺可数资源（券、库存）在并发访问下的安全预留与终局化/补偿：
//! 资源库与消息中间件之间没有分布式事务，一致性靠
//! 条件更新 + 延迟对账 + 到期兜底扫描三件套。
//!
//! # 模块结构
//!
//! ```text
//! reservation/
//! ├── backend       # GrantBackend: 券(行状态机) / 库存(子计数) 两种落地
//! ├── engine        # reserve / reconcile / 补偿
//! ├── tasks         # 任务行仓储（只增不删）
//! ├── consumer      # 释放队列消费者（有界重投）
//! ├── sweeper       # 到期兜底扫描
//! └── order_status  # 权威订单状态源（签名 RPC）
//! ```

mod backend;
mod consumer;
mod engine;
mod order_status;
mod sweeper;
pub mod tasks;

pub use backend::{CouponGrants, GrantBackend, StockCounters};
pub use consumer::ReleaseConsumer;
pub use engine::{Outcome, ReservationEngine, SagaError, DEFAULT_HOLD_WINDOW};
pub use order_status::{HttpOrderStatusSource, OrderQueryError, OrderStatus, OrderStatusSource};
pub use sweeper::ExpirySweeper;
