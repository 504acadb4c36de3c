//! Integration tests for the HTTP surface over connected networks.

use crate::mock_infrastructure::{
    app_config, block_numbers, create_test_block, create_test_log, log_filter, network_config,
    RpcMockBuilder, TOKEN, TRANSFER,
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use keel_core::{metrics::MetricsCollector, proxy::NetworkContext, proxy::NetworkRegistry, store::MemoryStore};
use serde_json::{json, Value};
use server::router::{create_router, AppState};
use std::sync::Arc;
use tower::ServiceExt;

fn rpc(host: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header(header::HOST, host)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn cache_status(response: &Response) -> &str {
    response.headers().get("x-cache-status").and_then(|v| v.to_str().ok()).unwrap_or_default()
}

async fn network(mock: &mut RpcMockBuilder, name: &str, chain_id: u64, head: u64) -> Arc<NetworkContext> {
    mock.mock_chain_id(chain_id).await;
    mock.mock_latest_block(&create_test_block(head)).await;

    let network = network_config(name, &mock.url(), &[(TOKEN, 100)]);
    let config = app_config(vec![network.clone()]);
    NetworkContext::connect(&network, &config, Arc::new(MemoryStore::new())).await.unwrap()
}

fn app(contexts: Vec<Arc<NetworkContext>>) -> Router {
    let state = AppState::new(NetworkRegistry::new(contexts), MetricsCollector::new());
    create_router(Arc::new(state), 100)
}

#[tokio::test]
async fn test_host_selects_network() {
    let mut mainnet = RpcMockBuilder::new().await;
    let mut goerli = RpcMockBuilder::new().await;
    let app = app(vec![
        network(&mut mainnet, "mainnet", 1, 2500).await,
        network(&mut goerli, "goerli", 5, 700).await,
    ]);
    let body = json!({"jsonrpc": "2.0", "method": "eth_blockNumber", "params": [], "id": 1});

    let response = app.clone().oneshot(rpc("mainnet.localhost:8545", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_status(&response), "FULL");
    assert_eq!(json_body(response).await["result"], "0x9c4");

    let response = app.clone().oneshot(rpc("Goerli.rpc.example.com", &body)).await.unwrap();
    assert_eq!(json_body(response).await["result"], "0x2bc");

    let response = app.oneshot(rpc("kovan.localhost", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["message"], "Invalid network: kovan");
}

#[tokio::test]
async fn test_synced_logs_are_served_with_full_status() {
    let mut mock = RpcMockBuilder::new().await;
    let ctx = network(&mut mock, "mainnet", 1, 1500).await;
    mock.mock_get_logs_for_range(100, 1099, &[create_test_log(TOKEN, 500, 0, &[TRANSFER])]).await;
    mock.mock_get_logs_for_range(1100, 1500, &[]).await;
    ctx.synchronizer().request_sync(Some(1500)).wait().await.unwrap();
    let app = app(vec![ctx]);

    let body = json!({
        "jsonrpc": "2.0",
        "method": "eth_getLogs",
        "params": log_filter(json!(TOKEN), "0x64", "latest", None),
        "id": "logs"
    });
    let response = app.clone().oneshot(rpc("mainnet.localhost", &body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_status(&response), "FULL");
    let payload = json_body(response).await;
    assert_eq!(payload["id"], "logs");
    assert_eq!(block_numbers(&payload["result"]), vec!["0x1f4"]);

    let count = app
        .oneshot(Request::builder().uri("/request-count").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(json_body(count).await, json!({"count": 1}));
}

#[tokio::test]
async fn test_block_miss_then_hit() {
    let mut mock = RpcMockBuilder::new().await;
    let ctx = network(&mut mock, "mainnet", 1, 2500).await;
    mock.mock_get_block_by_number(16, &create_test_block(16)).await;
    let app = app(vec![ctx]);
    let body = json!({"jsonrpc": "2.0", "method": "eth_getBlockByNumber", "params": ["0x10", false], "id": 1});

    let first = app.clone().oneshot(rpc("mainnet.localhost", &body)).await.unwrap();
    assert_eq!(cache_status(&first), "MISS");
    assert_eq!(json_body(first).await["result"]["number"], "0x10");

    // the write behind the miss is detached from the response
    let mut status = String::new();
    for _ in 0..50 {
        let response = app.clone().oneshot(rpc("mainnet.localhost", &body)).await.unwrap();
        status = cache_status(&response).to_string();
        if status == "FULL" {
            assert_eq!(json_body(response).await["result"]["number"], "0x10");
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(status, "FULL");
}

#[tokio::test]
async fn test_rejections_carry_status_and_message() {
    let mut mock = RpcMockBuilder::new().await;
    let app = app(vec![network(&mut mock, "mainnet", 1, 2500).await]);

    let cases = [
        (json!({"jsonrpc": "1.0", "method": "eth_chainId", "id": 1}), StatusCode::BAD_REQUEST),
        (
            json!({"jsonrpc": "2.0", "method": "eth_getBlockByHash", "params": ["0x00", false], "id": 1}),
            StatusCode::METHOD_NOT_ALLOWED,
        ),
        (
            json!({"jsonrpc": "2.0", "method": "eth_call", "params": [{"to": "0x0000000000000000000000000000000000000001"}, "latest"], "id": 1}),
            StatusCode::UNAUTHORIZED,
        ),
    ];

    for (body, expected) in cases {
        let response = app.clone().oneshot(rpc("mainnet.localhost", &body)).await.unwrap();
        assert_eq!(response.status(), expected, "body: {body}");
        assert!(json_body(response).await["message"].is_string());
    }
}
