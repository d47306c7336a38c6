//! 服务间调用认证
//!
//! 敏感路径上的每次跨服务调用携带四个签名头（来源、毫秒时间戳、
//! nonce、签名），见 `shared::rpc`。本模块两侧齐备：
//!
//! - 出站：[`SignedClient`] 盖章
//! - 入站：[`RequestVerifier`] 五步校验，统一拒绝
//!
//! 重放缓存与密钥表均为注入式抽象（[`ReplayStore`] / [`SecretStore`]），
//! 多实例部署可替换为共享存储实现。

mod client;
mod replay;
mod secrets;
mod signature;
mod verifier;

pub use client::{RpcClientError, SignedClient};
pub use replay::{ReplayCache, ReplayStore};
pub use secrets::{SecretStore, StaticSecretStore};
pub use signature::{canonical_path, compute_signature};
pub use verifier::{AuthRejected, RequestVerifier, DEFAULT_VALIDITY_WINDOW};
