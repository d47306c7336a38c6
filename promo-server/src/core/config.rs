//! 服务配置
//!
//! # 环境变量
//!
//! 所有配置项都可以通过环境变量覆盖：
//!
//! | 环境变量 | 默认值 | 说明 |
//! |----------|--------|------|
//! | DATABASE_URL | sqlite:promo.db?mode=rwc | 资源库连接串 |
//! | REDIS_URL | (未设置) | 锁存储；未设置时用进程内实现 |
//! | NODE_ID | 本机地址低位哈希 | 雪花分配器节点 id (0-1023) |
//! | HOLD_WINDOW_SECS | 1800 | 预留持有窗口（秒） |
//! | SWEEP_INTERVAL_SECS | 60 | 兜底扫描周期（秒） |
//! | RELEASE_CHANNEL_CAPACITY | 1024 | 释放队列容量 |
//! | ORDER_SERVICE_URL | http://localhost:3002 | 订单服务地址 |
//! | RPC_SOURCE | promo-server | 出站调用的来源身份 |
//! | RPC_SECRET | (空) | 出站调用密钥 |
//! | RPC_PEERS | (空) | 入站允许清单 "src:secret,src2:secret2" |
//! | REPLAY_MAX_ENTRIES | 100000 | 重放缓存容量阈值 |
//! | ENVIRONMENT | development | 运行环境 |
//!
//! # 示例
//!
//! ```ignore
//! REDIS_URL=redis://127.0.0.1 NODE_ID=3 cargo run
//! ```

use crate::idgen;

#[derive(Debug, Clone)]
pub struct Config {
    /// 资源库（grant / task 表）连接串
    pub database_url: String,
    /// 共享 KV 存储；`None` 时锁退化为进程内实现
    pub redis_url: Option<String>,
    /// 雪花分配器节点 id
    pub node_id: u16,
    /// 预留持有窗口（秒）
    pub hold_window_secs: u64,
    /// 兜底扫描周期（秒）
    pub sweep_interval_secs: u64,
    /// 释放队列容量
    pub release_channel_capacity: usize,
    /// 订单服务基地址
    pub order_service_url: String,
    /// 出站签名来源身份
    pub rpc_source: String,
    /// 出站签名密钥
    pub rpc_secret: String,
    /// 入站允许清单 "source:secret,source2:secret2"
    pub rpc_peers: String,
    /// 重放缓存容量阈值
    pub replay_max_entries: usize,
    /// 运行环境: development | staging | production
    pub environment: String,
}

impl Config {
    /// 从环境变量加载配置；未设置的项使用默认值
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:promo.db?mode=rwc".into()),
            redis_url: std::env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            node_id: std::env::var("NODE_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(idgen::default_node_id),
            hold_window_secs: std::env::var("HOLD_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1800),
            sweep_interval_secs: std::env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            release_channel_capacity: std::env::var("RELEASE_CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
            order_service_url: std::env::var("ORDER_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:3002".into()),
            rpc_source: std::env::var("RPC_SOURCE").unwrap_or_else(|_| "promo-server".into()),
            rpc_secret: std::env::var("RPC_SECRET").unwrap_or_default(),
            rpc_peers: std::env::var("RPC_PEERS").unwrap_or_default(),
            replay_max_entries: std::env::var("REPLAY_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100_000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(database_url: impl Into<String>, node_id: u16) -> Self {
        let mut config = Self::from_env();
        config.database_url = database_url.into();
        config.node_id = node_id;
        config
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
