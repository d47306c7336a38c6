//! 出站签名客户端
//!
//! 为每次服务间调用盖上四个签名头。与校验侧共用同一份签名实现，
//! 路径规范化天然一致。

use std::time::Duration;

use http::Method;
use shared::rpc::{self, RpcHeaders};
use thiserror::Error;
use uuid::Uuid;

use super::signature::compute_signature;

/// 出站请求超时
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum RpcClientError {
    #[error("invalid url: {0}")]
    Url(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// 签名 HTTP 客户端
#[derive(Clone)]
pub struct SignedClient {
    http: reqwest::Client,
    source: String,
    secret: String,
}

impl SignedClient {
    pub fn new(source: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            source: source.into(),
            secret: secret.into(),
        }
    }

    /// 生成一组签名头（时间戳取当前时刻，nonce 全新随机）
    pub fn signed_headers(&self, method: &Method, path: &str) -> RpcHeaders {
        let timestamp = shared::util::now_millis().to_string();
        let nonce = Uuid::new_v4().simple().to_string();
        let signature = compute_signature(
            method,
            path,
            &self.source,
            &timestamp,
            &nonce,
            &self.secret,
        );
        RpcHeaders {
            source: Some(self.source.clone()),
            timestamp: Some(timestamp),
            nonce: Some(nonce),
            signature: Some(signature),
        }
    }

    /// 签名 GET；查询串不参与签名（签名只覆盖规范化路径）
    pub async fn get(&self, url: reqwest::Url) -> Result<reqwest::Response, RpcClientError> {
        let headers = self.signed_headers(&Method::GET, url.path());
        let response = self
            .http
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .header(rpc::HEADER_SOURCE, headers.source.as_deref().unwrap_or(""))
            .header(
                rpc::HEADER_TIMESTAMP,
                headers.timestamp.as_deref().unwrap_or(""),
            )
            .header(rpc::HEADER_NONCE, headers.nonce.as_deref().unwrap_or(""))
            .header(
                rpc::HEADER_SIGNATURE,
                headers.signature.as_deref().unwrap_or(""),
            )
            .send()
            .await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::replay::ReplayCache;
    use crate::auth::secrets::StaticSecretStore;
    use crate::auth::verifier::{RequestVerifier, DEFAULT_VALIDITY_WINDOW};
    use std::sync::Arc;

    #[test]
    fn test_client_headers_verify_round_trip() {
        let client = SignedClient::new("promo-server", "shared-secret");
        let headers = client.signed_headers(&Method::GET, "/rpc/order/status");

        let secrets = Arc::new(StaticSecretStore::from_spec("promo-server:shared-secret"));
        let replay = Arc::new(ReplayCache::new(100, DEFAULT_VALIDITY_WINDOW));
        let verifier = RequestVerifier::new(secrets, replay);
        assert!(verifier
            .verify(&Method::GET, "/rpc/order/status", &headers)
            .is_ok());
    }

    #[test]
    fn test_client_generates_fresh_nonce_per_call() {
        let client = SignedClient::new("promo-server", "shared-secret");
        let a = client.signed_headers(&Method::GET, "/rpc/x");
        let b = client.signed_headers(&Method::GET, "/rpc/x");
        assert_ne!(a.nonce, b.nonce);
    }
}
