//! 权威订单状态源
//!
//! 对账唯一依据。生产实现经签名 RPC 查询订单服务；查询失败不在
//! 这里吞掉，引擎将其视为非支付终局并走补偿。

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::auth::SignedClient;

/// 订单的权威状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 未决：尚不能终局化
    Pending,
    /// 已支付
    Paid,
    /// 已取消
    Cancelled,
    /// 订单不存在
    NotFound,
}

#[derive(Error, Debug)]
#[error("order status query failed: {0}")]
pub struct OrderQueryError(pub String);

/// 注入式状态源
#[async_trait]
pub trait OrderStatusSource: Send + Sync {
    async fn status(&self, trade_ref: &str) -> Result<OrderStatus, OrderQueryError>;
}

/// 经签名 RPC 查询订单服务
pub struct HttpOrderStatusSource {
    client: SignedClient,
    base_url: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: OrderStatus,
}

impl HttpOrderStatusSource {
    pub fn new(client: SignedClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl OrderStatusSource for HttpOrderStatusSource {
    async fn status(&self, trade_ref: &str) -> Result<OrderStatus, OrderQueryError> {
        let base = self.base_url.trim_end_matches('/');
        let mut url = reqwest::Url::parse(&format!("{base}/rpc/order/status"))
            .map_err(|e| OrderQueryError(e.to_string()))?;
        url.query_pairs_mut().append_pair("trade_ref", trade_ref);

        let response = self
            .client
            .get(url)
            .await
            .map_err(|e| OrderQueryError(e.to_string()))?;
        let response = response
            .error_for_status()
            .map_err(|e| OrderQueryError(e.to_string()))?;
        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| OrderQueryError(e.to_string()))?;
        Ok(body.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_deserialization() {
        let parsed: StatusResponse = serde_json::from_str(r#"{"status":"PAID"}"#).unwrap();
        assert_eq!(parsed.status, OrderStatus::Paid);
        let parsed: StatusResponse = serde_json::from_str(r#"{"status":"NOT_FOUND"}"#).unwrap();
        assert_eq!(parsed.status, OrderStatus::NotFound);
    }
}
