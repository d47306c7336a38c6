//! Release Consumer - 释放队列消费者
//!
//! 消费延迟到期（死信）投递，按消息类型路由到对应引擎对账。
//! 未决订单有界重投：超出预算后不再排队，交给到期兜底扫描。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use shared::models::GrantKind;

use crate::broker::{DelayBroker, Delivery};

use super::engine::{Outcome, ReservationEngine};

/// 未决订单的重投间隔
const REDELIVERY_INTERVAL: Duration = Duration::from_secs(30);

/// 重投预算；耗尽后任务交给兜底扫描
const MAX_REDELIVERIES: u32 = 10;

/// Worker for draining the release queue
pub struct ReleaseConsumer {
    coupon: Arc<ReservationEngine>,
    stock: Arc<ReservationEngine>,
    broker: Arc<dyn DelayBroker>,
    shutdown: CancellationToken,
}

impl ReleaseConsumer {
    pub fn new(
        coupon: Arc<ReservationEngine>,
        stock: Arc<ReservationEngine>,
        broker: Arc<dyn DelayBroker>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            coupon,
            stock,
            broker,
            shutdown,
        }
    }

    /// 主循环：逐条对账直至通道关闭或收到 shutdown
    pub async fn run(self, mut release_rx: mpsc::Receiver<Delivery>) {
        tracing::info!("Release consumer started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Release consumer received shutdown signal");
                    break;
                }
                delivery = release_rx.recv() => {
                    match delivery {
                        Some(delivery) => self.handle(delivery).await,
                        None => break,
                    }
                }
            }
        }
        tracing::info!("Release consumer stopped");
    }

    async fn handle(&self, delivery: Delivery) {
        let task_id = delivery.message.task_id;
        let engine = match delivery.message.kind {
            GrantKind::Coupon => &self.coupon,
            GrantKind::Stock => &self.stock,
        };

        match engine.reconcile(task_id).await {
            Ok(Outcome::Retry) => {
                if delivery.attempt >= MAX_REDELIVERIES {
                    tracing::warn!(
                        task_id,
                        attempt = delivery.attempt,
                        "redelivery budget exhausted; leaving task to the expiry sweep"
                    );
                    return;
                }
                if let Err(e) = self
                    .broker
                    .redeliver(
                        delivery.message.clone(),
                        delivery.attempt + 1,
                        REDELIVERY_INTERVAL,
                    )
                    .await
                {
                    tracing::error!(task_id, error = %e, "redelivery failed");
                }
            }
            Ok(outcome) => {
                tracing::debug!(task_id, ?outcome, "task reconciled");
            }
            Err(e) => {
                // 对账自身出错（如任务不存在）不重投；过期任务有兜底
                tracing::error!(task_id, error = %e, "reconcile failed");
            }
        }
    }
}
