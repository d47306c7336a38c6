//! 锁获取重试策略
//!
//! 两档：固定次数固定间隔；限期重试（前段固定间隔，后段指数增长、
//! 封顶），在不引入无界退避的前提下缓解惊群。

use std::time::Duration;

/// 进入指数阶段前的固定间隔尝试次数
pub(crate) const FIXED_PHASE_ATTEMPTS: u32 = 20;

/// 固定阶段的重试间隔
const BASE_INTERVAL: Duration = Duration::from_millis(50);

/// 指数阶段的间隔上限
const MAX_INTERVAL: Duration = Duration::from_millis(800);

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// 单次尝试，失败即放弃
    None,
    /// 固定次数 + 固定间隔
    Fixed { attempts: u32, interval: Duration },
    /// 限期重试：截止前按 固定→指数(封顶) 间隔反复尝试
    UntilDeadline { timeout: Duration },
}

impl RetryPolicy {
    /// 第 `attempt` 次（0 起）失败后的等待时长；`None` 表示放弃
    ///
    /// `UntilDeadline` 的截止检查由调用方持有绝对时间点执行。
    pub(crate) fn next_delay(&self, attempt: u32) -> Option<Duration> {
        match *self {
            RetryPolicy::None => None,
            RetryPolicy::Fixed { attempts, interval } => {
                if attempt + 1 < attempts {
                    Some(interval)
                } else {
                    None
                }
            }
            RetryPolicy::UntilDeadline { .. } => {
                if attempt < FIXED_PHASE_ATTEMPTS {
                    Some(BASE_INTERVAL)
                } else {
                    let growth = (attempt + 1 - FIXED_PHASE_ATTEMPTS).min(4);
                    Some((BASE_INTERVAL * 2u32.pow(growth)).min(MAX_INTERVAL))
                }
            }
        }
    }

    /// 限期策略的超时时长（其余策略无截止）
    pub(crate) fn deadline_timeout(&self) -> Option<Duration> {
        match *self {
            RetryPolicy::UntilDeadline { timeout } => Some(timeout),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_gives_up_immediately() {
        assert_eq!(RetryPolicy::None.next_delay(0), None);
    }

    #[test]
    fn test_fixed_counts_attempts() {
        let policy = RetryPolicy::Fixed {
            attempts: 3,
            interval: Duration::from_millis(10),
        };
        assert_eq!(policy.next_delay(0), Some(Duration::from_millis(10)));
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(10)));
        assert_eq!(policy.next_delay(2), None);
    }

    #[test]
    fn test_deadline_fixed_then_exponential_capped() {
        let policy = RetryPolicy::UntilDeadline {
            timeout: Duration::from_secs(10),
        };
        // 前 20 次固定 50ms
        for attempt in 0..FIXED_PHASE_ATTEMPTS {
            assert_eq!(policy.next_delay(attempt), Some(Duration::from_millis(50)));
        }
        // 之后指数增长
        assert_eq!(policy.next_delay(20), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(21), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(22), Some(Duration::from_millis(400)));
        assert_eq!(policy.next_delay(23), Some(Duration::from_millis(800)));
        // 封顶不再增长
        assert_eq!(policy.next_delay(24), Some(Duration::from_millis(800)));
        assert_eq!(policy.next_delay(100), Some(Duration::from_millis(800)));
    }
}
