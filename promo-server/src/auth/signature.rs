//! 签名计算
//!
//! 签名串 = method + 规范化路径 + 来源身份 + 时间戳 + nonce + 共享密钥，
//! SHA-256 后取小写十六进制。签名与校验两侧的路径规范化必须完全一致，
//! 否则合法调用会被整批拒绝。

use http::Method;
use sha2::{Digest, Sha256};
use shared::rpc::PATH_MARKER;

/// 规范化路径：取从 [`PATH_MARKER`] 开始的后缀
///
/// 网关前缀随部署环境变化，签名只覆盖稳定后缀。路径中不含标记段时
/// 原样返回（直连场景）。
pub fn canonical_path(path: &str) -> &str {
    match path.find(PATH_MARKER) {
        Some(idx) => &path[idx..],
        None => path,
    }
}

/// 计算请求签名（小写 hex digest）
pub fn compute_signature(
    method: &Method,
    path: &str,
    source: &str,
    timestamp: &str,
    nonce: &str,
    secret: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_str());
    hasher.update(canonical_path(path));
    hasher.update(source);
    hasher.update(timestamp);
    hasher.update(nonce);
    hasher.update(secret);
    hex::encode(hasher.finalize())
}
