//! 调用方密钥表
//!
//! 允许清单即密钥表：有密钥的来源才是已知调用方。注入式抽象替代
//! 进程级静态表，多实例部署可换成共享存储实现。

use std::collections::HashMap;

/// 来源身份 → 共享密钥
pub trait SecretStore: Send + Sync {
    /// 已知来源返回其密钥；未知来源返回 `None`
    fn secret_for(&self, source: &str) -> Option<String>;
}

/// 配置内置的静态密钥表
#[derive(Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    pub fn new(secrets: HashMap<String, String>) -> Self {
        Self { secrets }
    }

    /// 从 `"source:secret,source2:secret2"` 格式解析（配置项格式）
    ///
    /// 畸形片段跳过并告警，不中断启动。
    pub fn from_spec(spec: &str) -> Self {
        let mut secrets = HashMap::new();
        for pair in spec.split(',').filter(|s| !s.trim().is_empty()) {
            match pair.trim().split_once(':') {
                Some((source, secret)) if !source.is_empty() && !secret.is_empty() => {
                    secrets.insert(source.to_string(), secret.to_string());
                }
                _ => tracing::warn!(pair, "ignoring malformed rpc peer entry"),
            }
        }
        Self { secrets }
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl SecretStore for StaticSecretStore {
    fn secret_for(&self, source: &str) -> Option<String> {
        self.secrets.get(source).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_spec_parses_pairs() {
        let store = StaticSecretStore::from_spec("order-service:abc,pay-service:def");
        assert_eq!(store.secret_for("order-service").as_deref(), Some("abc"));
        assert_eq!(store.secret_for("pay-service").as_deref(), Some("def"));
        assert_eq!(store.secret_for("unknown"), None);
    }

    #[test]
    fn test_from_spec_skips_malformed() {
        let store = StaticSecretStore::from_spec("good:s1,,broken,:empty,also-good:s2");
        assert_eq!(store.len(), 2);
        assert_eq!(store.secret_for("good").as_deref(), Some("s1"));
        assert_eq!(store.secret_for("also-good").as_deref(), Some("s2"));
    }
}
