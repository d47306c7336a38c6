//! 应用上下文
//!
//! 按配置装配全部协作组件。显式持有并注入（注册表、重放缓存、
//! 密钥表都不是进程级静态量），同进程可装配多套用于测试。

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::mpsc;

use crate::auth::{ReplayCache, RequestVerifier, SignedClient, StaticSecretStore};
use crate::broker::{Delivery, MemoryDelayBroker};
use crate::core::Config;
use crate::db;
use crate::idgen::{Snowflake, SnowflakeRegistry};
use crate::lock::{LockManager, LockStore, MemoryLockStore, RedisLockStore};
use crate::reservation::{
    CouponGrants, HttpOrderStatusSource, ReservationEngine, StockCounters,
};

/// 装配完成的服务上下文
pub struct AppContext {
    pub config: Config,
    pub pool: SqlitePool,
    pub lock: Arc<LockManager>,
    pub verifier: Arc<RequestVerifier>,
    /// 节点注册表；本节点分配器缓存在 `ids`
    pub registry: SnowflakeRegistry,
    pub ids: Arc<Snowflake>,
    pub broker: Arc<MemoryDelayBroker>,
    pub coupon_engine: Arc<ReservationEngine>,
    pub stock_engine: Arc<ReservationEngine>,
}

impl AppContext {
    /// 初始化全部组件；返回上下文与释放队列接收端
    pub async fn initialize(
        config: Config,
    ) -> anyhow::Result<(Self, mpsc::Receiver<Delivery>)> {
        let pool = db::connect(&config.database_url).await?;

        let lock_store: Arc<dyn LockStore> = match &config.redis_url {
            Some(url) => Arc::new(RedisLockStore::connect(url).await?),
            None => {
                tracing::warn!("REDIS_URL not set; falling back to in-process lock store");
                Arc::new(MemoryLockStore::new())
            }
        };
        let lock = Arc::new(LockManager::new(lock_store));

        let registry = SnowflakeRegistry::new();
        let ids = registry.get(config.node_id)?;
        tracing::info!(node_id = config.node_id, "snowflake allocator ready");

        let secrets = Arc::new(StaticSecretStore::from_spec(&config.rpc_peers));
        if secrets.is_empty() {
            tracing::warn!("RPC_PEERS empty; all inbound signed calls will be rejected");
        }
        let replay = Arc::new(ReplayCache::new(
            config.replay_max_entries,
            crate::auth::DEFAULT_VALIDITY_WINDOW,
        ));
        let verifier = Arc::new(RequestVerifier::new(secrets, replay));

        let (broker, release_rx) = MemoryDelayBroker::new(config.release_channel_capacity);

        let orders = Arc::new(HttpOrderStatusSource::new(
            SignedClient::new(&config.rpc_source, &config.rpc_secret),
            &config.order_service_url,
        ));

        let hold_window = std::time::Duration::from_secs(config.hold_window_secs);
        let coupon_engine = Arc::new(
            ReservationEngine::new(
                pool.clone(),
                Arc::new(CouponGrants),
                broker.clone(),
                orders.clone(),
                ids.clone(),
            )
            .with_hold_window(hold_window),
        );
        let stock_engine = Arc::new(
            ReservationEngine::new(
                pool.clone(),
                Arc::new(StockCounters),
                broker.clone(),
                orders,
                ids.clone(),
            )
            .with_hold_window(hold_window),
        );

        Ok((
            Self {
                config,
                pool,
                lock,
                verifier,
                registry,
                ids,
                broker,
                coupon_engine,
                stock_engine,
            },
            release_rx,
        ))
    }
}
