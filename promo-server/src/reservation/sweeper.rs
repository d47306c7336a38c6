//! 到期兜底扫描
//!
//! 独立周期任务：扫出已过期仍 LOCKED 的任务并强制补偿。
//! 延迟消息是否送达、是否丢失都不影响它。commit 与 publish 之间
//! 没有原子性，这个扫描是系统对该缺口的全部容忍，必须常开。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::engine::ReservationEngine;

/// 单轮扫描的任务上限
const SWEEP_BATCH: i64 = 100;

/// Periodic sweep over expired LOCKED reservation tasks
pub struct ExpirySweeper {
    engines: Vec<Arc<ReservationEngine>>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ExpirySweeper {
    pub fn new(
        engines: Vec<Arc<ReservationEngine>>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engines,
            interval,
            shutdown,
        }
    }

    /// 主循环：启动即扫一轮（补上停机期间的积压），之后按周期触发
    pub async fn run(self) {
        tracing::info!("Expiry sweeper started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Expiry sweeper received shutdown signal");
                    break;
                }
            }
            self.sweep_once().await;
        }
        tracing::info!("Expiry sweeper stopped");
    }

    async fn sweep_once(&self) {
        for engine in &self.engines {
            match engine.compensate_expired(SWEEP_BATCH).await {
                Ok(0) => {}
                Ok(count) => {
                    tracing::info!(kind = %engine.kind(), count, "compensated expired reservations");
                }
                Err(e) => {
                    tracing::error!(kind = %engine.kind(), error = %e, "expiry sweep failed");
                }
            }
        }
    }
}
