//! Integration tests for the WebSocket reply path over a connected network.

use crate::mock_infrastructure::{
    app_config, create_test_block, network_config, RpcMockBuilder, TOKEN,
};
use keel_core::{metrics::MetricsCollector, proxy::NetworkContext, proxy::NetworkRegistry, store::MemoryStore};
use serde_json::{json, Value};
use server::{router::AppState, ws::answer};
use std::sync::Arc;

async fn mainnet(mock: &mut RpcMockBuilder) -> AppState {
    mock.mock_chain_id(1).await;
    mock.mock_latest_block(&create_test_block(2500)).await;

    let network = network_config("mainnet", &mock.url(), &[(TOKEN, 100)]);
    let config = app_config(vec![network.clone()]);
    let ctx = NetworkContext::connect(&network, &config, Arc::new(MemoryStore::new())).await.unwrap();
    AppState::new(NetworkRegistry::new([ctx]), MetricsCollector::new())
}

async fn reply(state: &AppState, text: &str) -> Value {
    let reply = answer(state, "mainnet.localhost", text).await.unwrap();
    serde_json::from_str(&reply).unwrap()
}

#[tokio::test]
async fn test_cached_answer_keeps_request_id() {
    let mut mock = RpcMockBuilder::new().await;
    let state = mainnet(&mut mock).await;

    let reply = reply(&state, r#"{"jsonrpc":"2.0","id":"abc","method":"eth_chainId","params":[]}"#).await;

    assert_eq!(reply, json!({"jsonrpc": "2.0", "id": "abc", "result": "0x1"}));
    assert_eq!(state.requests.count(), 1);
}

#[tokio::test]
async fn test_upstream_answer_is_relayed() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_transaction_by_hash("0xfeed", &json!({"hash": "0xfeed", "blockNumber": "0x10"})).await;
    let state = mainnet(&mut mock).await;

    let reply = reply(
        &state,
        r#"{"jsonrpc":"2.0","id":4,"method":"eth_getTransactionByHash","params":["0xfeed"]}"#,
    )
    .await;

    assert_eq!(reply["id"], 4);
    assert_eq!(reply["result"]["hash"], "0xfeed");
}

#[tokio::test]
async fn test_rejection_is_reported_under_err() {
    let mut mock = RpcMockBuilder::new().await;
    let state = mainnet(&mut mock).await;

    let reply = reply(&state, r#"{"jsonrpc":"2.0","id":7,"method":"eth_mining","params":[]}"#).await;

    assert_eq!(reply["id"], 7);
    assert_eq!(reply["jsonrpc"], "2.0");
    assert_eq!(reply["err"], "Method eth_mining is not allowed");
    assert_eq!(state.requests.count(), 0);
}
