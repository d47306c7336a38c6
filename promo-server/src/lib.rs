//! Promo Server - 营销资源协调服务
//!
//! # 架构概述
//!
//! 多个独立服务并发预留稀缺可数资源（券、库存）时的协调层，
//! 资源库与消息中间件之间不做分布式事务：
//!
//! - **ID 分配** (`idgen`): 无协调服务的节点内单调雪花 ID
//! - **分布式锁** (`lock`): 共享 KV 存储上的原子获取/释放 + 重试策略
//! - **调用认证** (`auth`): 服务间签名校验，防重放、防时效外请求
//! - **预留 Saga** (`reservation`): 条件批量预留 + 延迟对账 + 到期兜底
//! - **延迟消息** (`broker`): 消息级 TTL / 死信语义的进程内实现
//!
//! # 模块结构
//!
//! ```text
//! promo-server/src/
//! ├── core/          # 配置、上下文、后台任务
//! ├── idgen/         # 雪花 ID 分配器
//! ├── lock/          # 分布式互斥量
//! ├── auth/          # 服务间调用签名与校验
//! ├── broker/        # 延迟队列 / 死信路由
//! ├── db/            # SQLite 连接池与 schema
//! ├── reservation/   # 预留-释放 Saga
//! └── utils/         # 日志
//! ```

pub mod auth;
pub mod broker;
pub mod core;
pub mod db;
pub mod idgen;
pub mod lock;
pub mod reservation;
pub mod utils;

// Re-export 公共类型
pub use auth::{RequestVerifier, SignedClient};
pub use crate::core::{AppContext, BackgroundTasks, Config, TaskKind};
pub use idgen::{Snowflake, SnowflakeRegistry};
pub use lock::{LockManager, RetryPolicy};
pub use reservation::{ReservationEngine, SagaError};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
    ____
   / __ \_________  ____ ___  ____
  / /_/ / ___/ __ \/ __ `__ \/ __ \
 / ____/ /  / /_/ / / / / / / /_/ /
/_/   /_/   \____/_/ /_/ /_/\____/
   _____
  / ___/___  ______   _____  _____
  \__ \/ _ \/ ___/ | / / _ \/ ___/
 ___/ /  __/ /   | |/ /  __/ /
/____/\___/_/    |___/\___/_/
    "#
    );
}
