//! RPC Mock Builder for Ethereum JSON-RPC Testing
//!
//! Wraps mockito to provide Ethereum-specific response builders for the calls keel makes
//! upstream.

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};

fn method(name: &str) -> Matcher {
    Matcher::Regex(format!(r#""method"\s*:\s*"{name}""#))
}

fn result_body(result: &Value) -> String {
    json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string()
}

/// Builder for creating mock Ethereum RPC responses.
///
/// Uses mockito internally but provides Ethereum-specific helpers. Mocks stay alive as long as
/// the builder does.
pub struct RpcMockBuilder {
    server: ServerGuard,
    mocks: Vec<Mock>,
}

impl RpcMockBuilder {
    /// Creates a new RPC mock builder with a fresh mockito server.
    pub async fn new() -> Self {
        Self { server: Server::new_async().await, mocks: Vec::new() }
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    async fn respond(&mut self, matcher: Matcher, result: &Value) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(matcher)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(result_body(result))
            .create_async()
            .await;

        self.mocks.push(mock);
        self
    }

    /// Mocks `eth_chainId`.
    pub async fn mock_chain_id(&mut self, chain_id: u64) -> &mut Self {
        self.respond(method("eth_chainId"), &json!(format!("0x{chain_id:x}"))).await
    }

    /// Mocks `eth_blockNumber`.
    pub async fn mock_block_number(&mut self, block_number: u64) -> &mut Self {
        self.respond(method("eth_blockNumber"), &json!(format!("0x{block_number:x}"))).await
    }

    /// Mocks `eth_getBlockByNumber("latest", _)`.
    pub async fn mock_latest_block(&mut self, block: &Value) -> &mut Self {
        let matcher = Matcher::AllOf(vec![
            method("eth_getBlockByNumber"),
            Matcher::Regex(r#""params"\s*:\s*\["latest""#.to_string()),
        ]);
        self.respond(matcher, block).await
    }

    /// Mocks `eth_getBlockByNumber` for one block number.
    pub async fn mock_get_block_by_number(&mut self, block_number: u64, block: &Value) -> &mut Self {
        let matcher = Matcher::AllOf(vec![
            method("eth_getBlockByNumber"),
            Matcher::Regex(format!(r#""params"\s*:\s*\["0x{block_number:x}""#)),
        ]);
        self.respond(matcher, block).await
    }

    /// Mocks `eth_getTransactionByHash` for one hash.
    pub async fn mock_transaction_by_hash(&mut self, hash: &str, transaction: &Value) -> &mut Self {
        let matcher = Matcher::AllOf(vec![
            method("eth_getTransactionByHash"),
            Matcher::Regex(format!(r#""params"\s*:\s*\["{hash}""#)),
        ]);
        self.respond(matcher, transaction).await
    }

    /// Mocks `eth_getLogs` for an exact `[from_block, to_block]` range.
    pub async fn mock_get_logs_for_range(
        &mut self,
        from_block: u64,
        to_block: u64,
        logs: &[Value],
    ) -> &mut Self {
        let matcher = Matcher::AllOf(vec![
            method("eth_getLogs"),
            Matcher::Regex(format!(r#""fromBlock"\s*:\s*"0x{from_block:x}""#)),
            Matcher::Regex(format!(r#""toBlock"\s*:\s*"0x{to_block:x}""#)),
        ]);
        self.respond(matcher, &Value::Array(logs.to_vec())).await
    }

    /// Mocks a JSON-RPC error object for `method_name`.
    pub async fn mock_rpc_error(&mut self, method_name: &str, code: i32, message: &str) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(method(method_name))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": { "code": code, "message": message }
                })
                .to_string(),
            )
            .create_async()
            .await;

        self.mocks.push(mock);
        self
    }

    /// Mocks an HTTP-level failure for `method_name`.
    pub async fn mock_http_status(&mut self, method_name: &str, status: usize) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(method(method_name))
            .with_status(status)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        self.mocks.push(mock);
        self
    }

    /// Mocks `eth_getLogs` for a range and expects it to be requested exactly `hits` times.
    pub async fn expect_get_logs_for_range(
        &mut self,
        from_block: u64,
        to_block: u64,
        logs: &[Value],
        hits: usize,
    ) -> Mock {
        self.server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                method("eth_getLogs"),
                Matcher::Regex(format!(r#""fromBlock"\s*:\s*"0x{from_block:x}""#)),
                Matcher::Regex(format!(r#""toBlock"\s*:\s*"0x{to_block:x}""#)),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(result_body(&Value::Array(logs.to_vec())))
            .expect(hits)
            .create_async()
            .await
    }
}
