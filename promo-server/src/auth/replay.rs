//! 重放缓存
//!
//! 记录已消费的 (来源, nonce, 时间戳) 三元组；同一三元组在有效窗口内
//! 第二次校验必然失败。所有入站请求并发读写同一缓存，插入必须是
//! 并发安全的 insert-if-absent。

use std::time::Duration;

use dashmap::DashMap;

/// 注入式重放防护存储（可替换为外部共享存储实现，支撑多实例部署）
pub trait ReplayStore: Send + Sync {
    /// 三元组未出现过则记录并返回 true；已出现返回 false
    fn check_and_insert(&self, source: &str, nonce: &str, timestamp_ms: i64) -> bool;
}

#[derive(Hash, PartialEq, Eq)]
struct ReplayKey {
    source: String,
    nonce: String,
    timestamp_ms: i64,
}

/// 进程内重放缓存
///
/// 超过容量阈值时自剪枝：淘汰时间戳已出有效窗口的条目（窗口外的
/// 请求本就无法通过时效校验，无需再记忆）。
pub struct ReplayCache {
    seen: DashMap<ReplayKey, ()>,
    max_entries: usize,
    window_ms: i64,
}

impl ReplayCache {
    pub fn new(max_entries: usize, window: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            max_entries,
            window_ms: window.as_millis() as i64,
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn prune(&self, now_ms: i64) {
        let cutoff = now_ms - self.window_ms;
        let before = self.seen.len();
        self.seen.retain(|key, _| key.timestamp_ms > cutoff);
        tracing::debug!(
            evicted = before - self.seen.len(),
            remaining = self.seen.len(),
            "replay cache pruned"
        );
    }
}

impl ReplayStore for ReplayCache {
    fn check_and_insert(&self, source: &str, nonce: &str, timestamp_ms: i64) -> bool {
        if self.seen.len() >= self.max_entries {
            self.prune(shared::util::now_millis());
        }
        let key = ReplayKey {
            source: source.to_string(),
            nonce: nonce.to_string(),
            timestamp_ms,
        };
        match self.seen.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(());
                true
            }
        }
    }
}
