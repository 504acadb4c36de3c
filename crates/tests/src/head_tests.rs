//! Integration tests for new-head handling.
//!
//! A head is published as the latest block only after its logs are synced, so a client that
//! reads `eth_blockNumber` can immediately query logs up to it from the cache.

use crate::mock_infrastructure::{
    app_config, block_numbers, create_test_block, create_test_log, log_filter, network_config,
    RpcMockBuilder, TOKEN, TRANSFER,
};
use keel_core::{
    proxy::NetworkContext,
    store::MemoryStore,
    types::{CacheStatus, JsonRpcRequest},
    upstream::HeadListener,
};
use serde_json::json;
use std::sync::Arc;

async fn connected(mock: &mut RpcMockBuilder) -> Arc<NetworkContext> {
    mock.mock_chain_id(1).await;
    mock.mock_latest_block(&create_test_block(2500)).await;
    mock.mock_get_logs_for_range(100, 1099, &[]).await;
    mock.mock_get_logs_for_range(1100, 2099, &[]).await;
    mock.mock_get_logs_for_range(2100, 2500, &[create_test_log(TOKEN, 2500, 0, &[TRANSFER])])
        .await;

    let network = network_config("mainnet", &mock.url(), &[(TOKEN, 100)]);
    let config = app_config(vec![network.clone()]);
    let ctx = NetworkContext::connect(&network, &config, Arc::new(MemoryStore::new())).await.unwrap();
    ctx.synchronizer().request_sync(Some(2500)).wait().await.unwrap();
    ctx
}

#[tokio::test]
async fn test_new_head_is_published_after_tail_sync() {
    let mut mock = RpcMockBuilder::new().await;
    let ctx = connected(&mut mock).await;
    mock.mock_get_logs_for_range(2501, 2600, &[create_test_log(TOKEN, 2600, 2, &[TRANSFER])])
        .await;
    mock.mock_get_block_by_number(2600, &create_test_block(2600)).await;

    ctx.on_new_head(2600).await;

    assert_eq!(ctx.head().latest_number(), Some(2600));

    let block_number = ctx
        .handle(JsonRpcRequest::new("eth_blockNumber", Some(json!([])), json!(1)))
        .await
        .unwrap();
    assert_eq!(block_number.result, Some(json!("0xa28")));
    assert_eq!(block_number.cache_status, Some(CacheStatus::Full));

    let logs = ctx
        .handle(JsonRpcRequest::new(
            "eth_getLogs",
            Some(log_filter(json!(TOKEN), "0x9c4", "latest", None)),
            json!(2),
        ))
        .await
        .unwrap();
    assert_eq!(logs.cache_status, Some(CacheStatus::Full));
    assert_eq!(block_numbers(logs.result.as_ref().unwrap()), vec!["0x9c4", "0xa28"]);
}

#[tokio::test]
async fn test_stale_head_is_ignored() {
    let mut mock = RpcMockBuilder::new().await;
    let ctx = connected(&mut mock).await;

    ctx.on_new_head(2400).await;
    ctx.on_new_head(2500).await;

    assert_eq!(ctx.head().latest_number(), Some(2500));
}

#[tokio::test]
async fn test_failed_tail_sync_keeps_synced_range_only() {
    let mut mock = RpcMockBuilder::new().await;
    let ctx = connected(&mut mock).await;
    mock.mock_http_status("eth_getLogs", 503).await;
    mock.mock_get_block_by_number(2600, &create_test_block(2600)).await;

    ctx.on_new_head(2600).await;

    let logs = ctx
        .handle(JsonRpcRequest::new(
            "eth_getLogs",
            Some(log_filter(json!(TOKEN), "0x9c4", "0x9c4", None)),
            json!(1),
        ))
        .await
        .unwrap();
    assert_eq!(logs.cache_status, Some(CacheStatus::Full));

    let unsynced = ctx
        .handle(JsonRpcRequest::new(
            "eth_getLogs",
            Some(log_filter(json!(TOKEN), "0x9c4", "0xa28", None)),
            json!(2),
        ))
        .await;
    assert!(unsynced.is_err(), "tail beyond the failed window must not be served: {unsynced:?}");
}
