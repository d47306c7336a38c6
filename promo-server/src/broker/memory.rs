//! 进程内延迟队列实现
//!
//! 每条消息一个 tokio 定时器，到期写入有界 mpsc 释放通道。
//! 关闭令牌触发后未到期的消息直接丢弃。持久化不是这层的职责，
//! 丢失的延迟消息由到期兜底扫描补偿。

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{BrokerError, DelayBroker, Delivery, ReleaseMessage};

/// In-process delay broker backed by tokio timers
pub struct MemoryDelayBroker {
    release_tx: mpsc::Sender<Delivery>,
    shutdown: CancellationToken,
}

impl MemoryDelayBroker {
    /// 创建代理；返回的接收端即"释放队列"，交给对账消费者
    pub fn new(capacity: usize) -> (std::sync::Arc<Self>, mpsc::Receiver<Delivery>) {
        let (release_tx, release_rx) = mpsc::channel(capacity);
        let broker = std::sync::Arc::new(Self {
            release_tx,
            shutdown: CancellationToken::new(),
        });
        (broker, release_rx)
    }

    /// 停止投递（丢弃所有未到期定时器）
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    fn schedule(&self, delivery: Delivery, delay: Duration) -> Result<(), BrokerError> {
        if self.release_tx.is_closed() {
            return Err(BrokerError::ChannelClosed);
        }
        let tx = self.release_tx.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if tx.send(delivery).await.is_err() {
                        tracing::warn!("release queue receiver dropped; delivery lost");
                    }
                }
                _ = shutdown.cancelled() => {}
            }
        });
        Ok(())
    }
}

#[async_trait]
impl DelayBroker for MemoryDelayBroker {
    async fn publish_delayed(
        &self,
        message: ReleaseMessage,
        ttl: Duration,
    ) -> Result<(), BrokerError> {
        self.schedule(
            Delivery {
                message,
                attempt: 1,
            },
            ttl,
        )
    }

    async fn redeliver(
        &self,
        message: ReleaseMessage,
        attempt: u32,
        delay: Duration,
    ) -> Result<(), BrokerError> {
        self.schedule(Delivery { message, attempt }, delay)
    }
}
