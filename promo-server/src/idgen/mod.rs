//! 雪花 ID 分配器
//!
//! 无协调服务的节点内单调递增 64 位 ID。布局 (高位→低位)：
//!
//! ```text
//! 1 bit 符号位 (恒 0) | 41 bits 毫秒时间戳 (自 2024-01-01 UTC) | 10 bits 节点 | 12 bits 序列
//! ```
//!
//! 每个节点 id 只存在一个分配器实例，经 [`SnowflakeRegistry`] 缓存；
//! 时钟小幅回拨（≤5ms）等待追平后重试一次，超限直接报错，绝不发出
//! 比历史时间戳更小的 ID。

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Custom epoch: 2024-01-01 00:00:00 UTC
pub const EPOCH_MS: i64 = 1_704_067_200_000;

/// 节点 id 上限 (10 bits)
pub const MAX_NODE_ID: u16 = 0x3FF;

/// 每毫秒序列空间 (12 bits)
const MAX_SEQUENCE: u16 = 0xFFF;

const NODE_SHIFT: u32 = 12;
const TIMESTAMP_SHIFT: u32 = 22;

/// 可容忍的时钟回拨幅度
const MAX_BACKWARD_DRIFT_MS: i64 = 5;

/// 雪花 ID 分配错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SnowflakeError {
    #[error("node id {0} out of range (0-{MAX_NODE_ID})")]
    NodeIdOutOfRange(u16),

    #[error("clock moved backwards by {0}ms, refusing to issue id")]
    ClockMovedBackwards(i64),
}

/// `parse` 的逆分解结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParts {
    /// Unix 毫秒时间戳（已加回纪元）
    pub timestamp_ms: i64,
    pub node_id: u16,
    pub sequence: u16,
}

struct AllocatorState {
    last_ms: i64,
    sequence: u16,
}

/// 单节点雪花分配器
///
/// `next()` 为同步调用：序列耗尽时自旋等待时钟前进（同一毫秒最多
/// 4096 个 ID，实际场景极少触发）。
pub struct Snowflake {
    node_id: u16,
    state: parking_lot::Mutex<AllocatorState>,
}

impl Snowflake {
    /// 创建分配器；越界节点 id 在构造时拒绝
    pub fn new(node_id: u16) -> Result<Self, SnowflakeError> {
        if node_id > MAX_NODE_ID {
            return Err(SnowflakeError::NodeIdOutOfRange(node_id));
        }
        Ok(Self {
            node_id,
            state: parking_lot::Mutex::new(AllocatorState {
                last_ms: 0,
                sequence: 0,
            }),
        })
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    /// 发出下一个 ID（节点内严格递增）
    pub fn next(&self) -> Result<i64, SnowflakeError> {
        let mut state = self.state.lock();
        let mut now = shared::util::now_millis();

        if now < state.last_ms {
            let drift = state.last_ms - now;
            if drift > MAX_BACKWARD_DRIFT_MS {
                return Err(SnowflakeError::ClockMovedBackwards(drift));
            }
            // 小幅回拨：等待追平后重试一次
            std::thread::sleep(Duration::from_millis(drift as u64 + 1));
            now = shared::util::now_millis();
            if now < state.last_ms {
                return Err(SnowflakeError::ClockMovedBackwards(state.last_ms - now));
            }
        }

        if now == state.last_ms {
            if state.sequence == MAX_SEQUENCE {
                // 序列耗尽：自旋到下一毫秒
                while now <= state.last_ms {
                    std::hint::spin_loop();
                    now = shared::util::now_millis();
                }
                state.sequence = 0;
            } else {
                state.sequence += 1;
            }
        } else {
            state.sequence = 0;
        }
        state.last_ms = now;

        Ok(((now - EPOCH_MS) << TIMESTAMP_SHIFT)
            | ((self.node_id as i64) << NODE_SHIFT)
            | state.sequence as i64)
    }
}

/// 逆分解 ID（诊断用）
pub fn parse(id: i64) -> IdParts {
    IdParts {
        timestamp_ms: (id >> TIMESTAMP_SHIFT) + EPOCH_MS,
        node_id: ((id >> NODE_SHIFT) & MAX_NODE_ID as i64) as u16,
        sequence: (id & MAX_SEQUENCE as i64) as u16,
    }
}

/// 按节点 id 缓存分配器实例的注册表
///
/// 显式注入调用方，替代进程级单例：同进程可承载多个逻辑节点，
/// 测试之间互不干扰。
#[derive(Default)]
pub struct SnowflakeRegistry {
    nodes: DashMap<u16, Arc<Snowflake>>,
}

impl SnowflakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取（或创建）节点分配器；同一节点 id 始终返回同一实例
    pub fn get(&self, node_id: u16) -> Result<Arc<Snowflake>, SnowflakeError> {
        if node_id > MAX_NODE_ID {
            return Err(SnowflakeError::NodeIdOutOfRange(node_id));
        }
        if let Some(existing) = self.nodes.get(&node_id) {
            return Ok(existing.clone());
        }
        let created = Arc::new(Snowflake::new(node_id)?);
        Ok(self
            .nodes
            .entry(node_id)
            .or_insert(created)
            .value()
            .clone())
    }
}

/// 未显式配置时的节点 id：本机网络地址的低位哈希
pub fn default_node_id() -> u16 {
    let addr = local_address().unwrap_or_else(|| "127.0.0.1".to_string());
    let digest = Sha256::digest(addr.as_bytes());
    u16::from_be_bytes([digest[30], digest[31]]) & MAX_NODE_ID
}

/// 通过 UDP connect 探测本机出口地址（不发送任何报文）
fn local_address() -> Option<String> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    Some(socket.local_addr().ok()?.ip().to_string())
}
