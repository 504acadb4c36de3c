//! Test Helper Functions and Utilities
//!
//! Common helpers for creating test data and fixtures.

use keel_core::config::{AppConfig, ContractConfig, NetworkConfig};
use serde_json::{json, Value};

pub const TOKEN: &str = "0x6b175474e89094c44da98b954eedeac495271d0f";
pub const VAULT: &str = "0x00000000000000000000000000000000000000bb";

pub const TRANSFER: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
pub const APPROVAL: &str = "0x8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925";

/// Creates a single test log emitted by `address`.
#[must_use]
pub fn create_test_log(address: &str, block_number: u64, log_index: u64, topics: &[&str]) -> Value {
    json!({
        "address": address,
        "topics": topics,
        "data": "0x",
        "blockNumber": format!("0x{block_number:x}"),
        "transactionHash": format!("0x{:064x}", block_number * 100 + log_index),
        "transactionIndex": "0x0",
        "blockHash": format!("0x{block_number:064x}"),
        "logIndex": format!("0x{log_index:x}"),
        "removed": false
    })
}

/// Creates a shallow test block.
#[must_use]
pub fn create_test_block(block_number: u64) -> Value {
    json!({
        "number": format!("0x{block_number:x}"),
        "hash": format!("0x{block_number:064x}"),
        "parentHash": format!("0x{:064x}", block_number.saturating_sub(1)),
        "timestamp": format!("0x{:x}", 1_600_000_000 + block_number),
        "transactions": []
    })
}

/// Network named `name` served by `upstream_url`, syncing `contracts` (address, genesis).
#[must_use]
pub fn network_config(name: &str, upstream_url: &str, contracts: &[(&str, u64)]) -> NetworkConfig {
    NetworkConfig {
        name: name.to_string(),
        upstream_url: upstream_url.to_string(),
        subscription_url: None,
        allowed_addresses: vec![],
        contracts: contracts
            .iter()
            .map(|(address, genesis)| ContractConfig {
                address: (*address).to_string(),
                genesis_block: Some(*genesis),
            })
            .collect(),
    }
}

/// Default configuration serving `networks` with the in-memory store.
#[must_use]
pub fn app_config(networks: Vec<NetworkConfig>) -> AppConfig {
    let mut config = AppConfig { networks, ..AppConfig::default() };
    config.storage.database_url = "memory".to_string();
    config
}

/// `eth_getLogs` filter params.
#[must_use]
pub fn log_filter(address: Value, from_block: &str, to_block: &str, topics: Option<Value>) -> Value {
    let mut filter = json!({ "address": address, "fromBlock": from_block, "toBlock": to_block });
    if let Some(topics) = topics {
        filter["topics"] = topics;
    }
    json!([filter])
}

/// Block numbers of a log list, in order.
#[must_use]
pub fn block_numbers(logs: &Value) -> Vec<String> {
    logs.as_array()
        .map(|logs| {
            logs.iter()
                .filter_map(|log| log["blockNumber"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
