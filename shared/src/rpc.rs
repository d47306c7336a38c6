//! 服务间签名调用的头部契约
//!
//! Every security-sensitive inter-service call carries four headers.
//! Header names are case-sensitive and shared verbatim by signer and
//! verifier; changing one side alone breaks every cross-service call.

/// Calling service identity (e.g. `"order-service"`)
pub const HEADER_SOURCE: &str = "X-Rpc-Source";

/// Millisecond timestamp, decimal string
pub const HEADER_TIMESTAMP: &str = "X-Rpc-Timestamp";

/// Single-use random token
pub const HEADER_NONCE: &str = "X-Rpc-Nonce";

/// Lowercase hex digest over the signing string
pub const HEADER_SIGNATURE: &str = "X-Rpc-Signature";

/// URL 路径中的标记段：签名只覆盖从该段开始的后缀
///
/// Both sides sign the canonical suffix starting at this marker, never the
/// full deployment-dependent path (gateway prefixes vary per environment).
pub const PATH_MARKER: &str = "/rpc/";

/// The four signed values extracted from (or stamped onto) a request.
///
/// 字段缺失无法用空字符串表达，用 `Option` 显式区分"未携带"。
#[derive(Debug, Clone, Default)]
pub struct RpcHeaders {
    pub source: Option<String>,
    pub timestamp: Option<String>,
    pub nonce: Option<String>,
    pub signature: Option<String>,
}

impl RpcHeaders {
    /// 四个头是否齐全
    pub fn is_complete(&self) -> bool {
        self.source.is_some()
            && self.timestamp.is_some()
            && self.nonce.is_some()
            && self.signature.is_some()
    }
}
