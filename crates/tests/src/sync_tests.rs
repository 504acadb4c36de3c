//! Integration tests for log synchronization and `eth_getLogs` cache coverage.
//!
//! A network is connected against a mockito upstream at head 2500 with one contract deployed at
//! block 100. The first sync pass walks `[100, 1099]`, `[1100, 2099]` and `[2100, 2500]`.

use crate::mock_infrastructure::{
    app_config, block_numbers, create_test_block, create_test_log, log_filter, network_config,
    RpcMockBuilder, APPROVAL, TOKEN, TRANSFER, VAULT,
};
use keel_core::{
    proxy::NetworkContext,
    store,
    types::{CacheStatus, JsonRpcRequest, JsonRpcResponse},
};
use serde_json::{json, Value};
use std::sync::Arc;

async fn synced_upstream() -> RpcMockBuilder {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_chain_id(1).await;
    mock.mock_latest_block(&create_test_block(2500)).await;
    mock.mock_get_logs_for_range(
        100,
        1099,
        &[create_test_log(TOKEN, 150, 0, &[TRANSFER]), create_test_log(TOKEN, 900, 3, &[APPROVAL])],
    )
    .await;
    mock.mock_get_logs_for_range(1100, 2099, &[create_test_log(TOKEN, 1500, 1, &[TRANSFER])])
        .await;
    mock.mock_get_logs_for_range(2100, 2500, &[create_test_log(TOKEN, 2500, 0, &[TRANSFER])])
        .await;
    mock
}

async fn connect(mock: &RpcMockBuilder, database_url: &str) -> Arc<NetworkContext> {
    let network = network_config("mainnet", &mock.url(), &[(TOKEN, 100)]);
    let config = app_config(vec![network.clone()]);
    let store = store::connect(database_url).await.unwrap();
    NetworkContext::connect(&network, &config, store).await.unwrap()
}

async fn get_logs(ctx: &NetworkContext, params: Value) -> JsonRpcResponse {
    ctx.handle(JsonRpcRequest::new("eth_getLogs", Some(params), json!(1))).await.unwrap()
}

#[tokio::test]
async fn test_synced_range_is_served_from_cache() {
    let mock = synced_upstream().await;
    let ctx = connect(&mock, "memory").await;
    ctx.synchronizer().request_sync(Some(2500)).wait().await.unwrap();

    let response = get_logs(&ctx, log_filter(json!(TOKEN), "0x96", "0x384", None)).await;

    assert_eq!(response.cache_status, Some(CacheStatus::Full));
    assert_eq!(block_numbers(response.result.as_ref().unwrap()), vec!["0x96", "0x384"]);
}

#[tokio::test]
async fn test_cached_logs_honor_topic_filter() {
    let mock = synced_upstream().await;
    let ctx = connect(&mock, "memory").await;
    ctx.synchronizer().request_sync(Some(2500)).wait().await.unwrap();

    let response =
        get_logs(&ctx, log_filter(json!(TOKEN), "0x64", "latest", Some(json!([[APPROVAL]])))).await;

    assert_eq!(response.cache_status, Some(CacheStatus::Full));
    assert_eq!(block_numbers(response.result.as_ref().unwrap()), vec!["0x384"]);
}

#[tokio::test]
async fn test_to_block_beyond_head_is_clamped() {
    let mock = synced_upstream().await;
    let ctx = connect(&mock, "memory").await;
    ctx.synchronizer().request_sync(Some(2500)).wait().await.unwrap();

    let response = get_logs(&ctx, log_filter(json!(TOKEN), "0x96", "0xbb8", None)).await;

    assert_eq!(response.cache_status, Some(CacheStatus::Full));
    assert_eq!(
        block_numbers(response.result.as_ref().unwrap()),
        vec!["0x96", "0x384", "0x5dc", "0x9c4"]
    );
}

#[tokio::test]
async fn test_range_below_genesis_falls_back_to_upstream() {
    let mut mock = synced_upstream().await;
    mock.mock_get_logs_for_range(0, 900, &[create_test_log(TOKEN, 42, 0, &[TRANSFER])]).await;
    let ctx = connect(&mock, "memory").await;
    ctx.synchronizer().request_sync(Some(2500)).wait().await.unwrap();

    let response = get_logs(&ctx, log_filter(json!(TOKEN), "0x0", "0x384", None)).await;

    assert_eq!(response.cache_status, Some(CacheStatus::Miss));
    assert_eq!(block_numbers(response.result.as_ref().unwrap()), vec!["0x2a"]);
}

#[tokio::test]
async fn test_query_before_first_pass_is_a_miss() {
    let mut mock = synced_upstream().await;
    mock.mock_get_logs_for_range(150, 900, &[]).await;
    let ctx = connect(&mock, "memory").await;

    let response = get_logs(&ctx, log_filter(json!(TOKEN), "0x96", "0x384", None)).await;

    assert_eq!(response.cache_status, Some(CacheStatus::Miss));
    assert_eq!(response.result, Some(json!([])));
}

#[tokio::test]
async fn test_unsynced_address_is_rejected_before_upstream() {
    let mock = synced_upstream().await;
    let ctx = connect(&mock, "memory").await;

    let result = ctx
        .handle(JsonRpcRequest::new(
            "eth_getLogs",
            Some(log_filter(json!([TOKEN, VAULT]), "0x96", "0x384", None)),
            json!(1),
        ))
        .await;

    match result {
        Err(e) => assert!(e.to_string().contains(VAULT), "unexpected error: {e}"),
        other => panic!("Expected whitelist rejection, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_sqlite_store_serves_synced_range() {
    let mock = synced_upstream().await;
    let ctx = connect(&mock, "sqlite::memory:").await;
    ctx.synchronizer().request_sync(Some(2500)).wait().await.unwrap();

    let response = get_logs(&ctx, log_filter(json!(TOKEN), "0x5dc", "latest", None)).await;

    assert_eq!(response.cache_status, Some(CacheStatus::Full));
    assert_eq!(block_numbers(response.result.as_ref().unwrap()), vec!["0x5dc", "0x9c4"]);
}
