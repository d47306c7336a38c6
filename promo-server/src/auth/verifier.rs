//! 入站请求校验
//!
//! 校验顺序：头部齐全 → 来源在允许清单 → 时间戳在有效窗口 →
//! 三元组未被重放 → 签名一致。任何一步失败对外都是同一个
//! [`AuthRejected`]，具体原因只进内部日志。

use std::sync::Arc;
use std::time::Duration;

use http::Method;
use shared::rpc::RpcHeaders;
use thiserror::Error;

use super::replay::ReplayStore;
use super::secrets::SecretStore;
use super::signature::compute_signature;

/// 时间戳有效窗口（5 分钟）
pub const DEFAULT_VALIDITY_WINDOW: Duration = Duration::from_secs(300);

/// 统一拒绝：对外不暴露失败环节
#[derive(Error, Debug, PartialEq, Eq)]
#[error("forbidden")]
pub struct AuthRejected;

/// 内部拒绝原因，仅用于日志
#[derive(Debug)]
enum RejectReason {
    MissingHeaders,
    UnknownSource,
    MalformedTimestamp,
    StaleTimestamp,
    ReplayedNonce,
    BadSignature,
}

/// 签名请求校验器
pub struct RequestVerifier {
    secrets: Arc<dyn SecretStore>,
    replay: Arc<dyn ReplayStore>,
    window_ms: i64,
}

impl RequestVerifier {
    pub fn new(secrets: Arc<dyn SecretStore>, replay: Arc<dyn ReplayStore>) -> Self {
        Self::with_window(secrets, replay, DEFAULT_VALIDITY_WINDOW)
    }

    pub fn with_window(
        secrets: Arc<dyn SecretStore>,
        replay: Arc<dyn ReplayStore>,
        window: Duration,
    ) -> Self {
        Self {
            secrets,
            replay,
            window_ms: window.as_millis() as i64,
        }
    }

    /// 校验一次签名调用
    pub fn verify(
        &self,
        method: &Method,
        path: &str,
        headers: &RpcHeaders,
    ) -> Result<(), AuthRejected> {
        match self.check(method, path, headers) {
            Ok(()) => Ok(()),
            Err(reason) => {
                tracing::warn!(
                    ?reason,
                    source = headers.source.as_deref().unwrap_or("<missing>"),
                    path,
                    "rejected signed request"
                );
                Err(AuthRejected)
            }
        }
    }

    fn check(&self, method: &Method, path: &str, headers: &RpcHeaders) -> Result<(), RejectReason> {
        let (Some(source), Some(timestamp), Some(nonce), Some(signature)) = (
            headers.source.as_deref(),
            headers.timestamp.as_deref(),
            headers.nonce.as_deref(),
            headers.signature.as_deref(),
        ) else {
            return Err(RejectReason::MissingHeaders);
        };

        let secret = self
            .secrets
            .secret_for(source)
            .ok_or(RejectReason::UnknownSource)?;

        let timestamp_ms: i64 = timestamp
            .parse()
            .map_err(|_| RejectReason::MalformedTimestamp)?;
        let now = shared::util::now_millis();
        if (now - timestamp_ms).abs() > self.window_ms {
            return Err(RejectReason::StaleTimestamp);
        }

        if !self.replay.check_and_insert(source, nonce, timestamp_ms) {
            return Err(RejectReason::ReplayedNonce);
        }

        let expected = compute_signature(method, path, source, timestamp, nonce, &secret);
        if expected != signature {
            return Err(RejectReason::BadSignature);
        }
        Ok(())
    }
}
