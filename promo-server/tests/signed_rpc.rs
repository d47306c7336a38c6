//! 服务间签名调用：出站盖章 → 入站校验 全链路
//! Run: cargo test -p promo-server --test signed_rpc

use std::sync::Arc;

use http::Method;

use promo_server::auth::{
    ReplayCache, RequestVerifier, SignedClient, StaticSecretStore, DEFAULT_VALIDITY_WINDOW,
};

fn verifier() -> RequestVerifier {
    let secrets = Arc::new(StaticSecretStore::from_spec("order-service:inter-svc-secret"));
    let replay = Arc::new(ReplayCache::new(1000, DEFAULT_VALIDITY_WINDOW));
    RequestVerifier::new(secrets, replay)
}

#[tokio::test]
async fn test_client_stamped_call_passes_verification() {
    let client = SignedClient::new("order-service", "inter-svc-secret");
    let verifier = verifier();

    let headers = client.signed_headers(&Method::GET, "/rpc/promo/grant");
    assert!(verifier
        .verify(&Method::GET, "/rpc/promo/grant", &headers)
        .is_ok());
}

// Scenario D: 有效窗口内重用 nonce，即使签名重新算对也必须拒绝
#[tokio::test]
async fn scenario_d_nonce_reuse_rejected_on_second_attempt() {
    let client = SignedClient::new("order-service", "inter-svc-secret");
    let verifier = verifier();

    let headers = client.signed_headers(&Method::GET, "/rpc/promo/grant");
    assert!(verifier
        .verify(&Method::GET, "/rpc/promo/grant", &headers)
        .is_ok());
    // 同一组头原样重放：签名仍然正确，但三元组已被消费
    assert!(verifier
        .verify(&Method::GET, "/rpc/promo/grant", &headers)
        .is_err());
}

#[tokio::test]
async fn test_gateway_and_direct_paths_interoperate() {
    let client = SignedClient::new("order-service", "inter-svc-secret");
    let verifier = verifier();

    // 客户端按网关暴露的完整路径签名，服务端看到剥过前缀的路径
    let headers = client.signed_headers(&Method::GET, "/api/gateway/rpc/promo/grant");
    assert!(verifier
        .verify(&Method::GET, "/rpc/promo/grant", &headers)
        .is_ok());
}

#[tokio::test]
async fn test_unknown_caller_uniformly_rejected() {
    // 密钥正确格式、来源未注册
    let client = SignedClient::new("rogue-service", "inter-svc-secret");
    let verifier = verifier();

    let headers = client.signed_headers(&Method::GET, "/rpc/promo/grant");
    assert!(verifier
        .verify(&Method::GET, "/rpc/promo/grant", &headers)
        .is_err());
}

#[tokio::test]
async fn test_wrong_secret_rejected() {
    let client = SignedClient::new("order-service", "guessed-secret");
    let verifier = verifier();

    let headers = client.signed_headers(&Method::GET, "/rpc/promo/grant");
    assert!(verifier
        .verify(&Method::GET, "/rpc/promo/grant", &headers)
        .is_err());
}
