use super::{
    endpoint::Endpoint,
    http_client::HttpClient,
    websocket::{self, SOCKET_CALL_TIMEOUT},
    UpstreamError,
};
use crate::{
    sync::LogSource,
    types::{JsonRpcRequest, JsonRpcResponse, LogEntry},
    utils::hex::{normalize_number, quantity_from_json},
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

/// Sends JSON-RPC requests to one network's upstream node.
#[derive(Debug)]
pub struct UpstreamDispatcher {
    endpoint: Endpoint,
    http: HttpClient,
    socket_timeout: Duration,
    next_id: AtomicU64,
}

impl UpstreamDispatcher {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: Endpoint) -> Result<Self, UpstreamError> {
        Ok(Self {
            endpoint,
            http: HttpClient::new()?,
            socket_timeout: SOCKET_CALL_TIMEOUT,
            next_id: AtomicU64::new(1),
        })
    }

    #[must_use]
    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Forwards `request` unchanged and returns the upstream reply, error payloads included.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] on transport failure, timeout or an undecodable reply.
    pub async fn send(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, UpstreamError> {
        let result = match &self.endpoint {
            Endpoint::Http(url) => self.http.send(url, request).await,
            Endpoint::Socket(url) => websocket::call_once(url, request, self.socket_timeout).await,
        };

        if let Err(e) = &result {
            tracing::debug!(endpoint = %self.endpoint, method = %request.method, error = %e, "upstream call failed");
        }
        result
    }

    /// Issues a call of keel's own and returns its `result`.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send), plus [`UpstreamError::RpcError`] when the node answers with an
    /// error object.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, UpstreamError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(method, Some(params), json!(id));

        let response = self.send(&request).await?;
        if let Some(error) = response.error {
            return Err(UpstreamError::RpcError(error.code, error.message));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// `eth_chainId`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::InvalidResponse`] if the result is not a quantity.
    pub async fn chain_id(&self) -> Result<u64, UpstreamError> {
        let result = self.call("eth_chainId", json!([])).await?;
        quantity_from_json(&result)
            .ok_or_else(|| UpstreamError::InvalidResponse(format!("chain id: {result}")))
    }

    /// Shallow `eth_getBlockByNumber`; `None` if the node does not know the block yet.
    ///
    /// # Errors
    ///
    /// Propagates call failures.
    pub async fn block_by_number(&self, number: u64) -> Result<Option<Value>, UpstreamError> {
        let result =
            self.call("eth_getBlockByNumber", json!([normalize_number(number), false])).await?;
        Ok((!result.is_null()).then_some(result))
    }

    /// `eth_getBlockByNumber("latest", false)`.
    ///
    /// # Errors
    ///
    /// Propagates call failures.
    pub async fn latest_block(&self) -> Result<Value, UpstreamError> {
        self.call("eth_getBlockByNumber", json!(["latest", false])).await
    }
}

#[async_trait]
impl LogSource for UpstreamDispatcher {
    async fn head_block_number(&self) -> Result<u64, UpstreamError> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        quantity_from_json(&result)
            .ok_or_else(|| UpstreamError::InvalidResponse(format!("block number: {result}")))
    }

    async fn logs_in_range(
        &self,
        address: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<LogEntry>, UpstreamError> {
        let filter = json!([{
            "address": address,
            "fromBlock": normalize_number(from),
            "toBlock": normalize_number(to),
        }]);
        let result = self.call("eth_getLogs", filter).await?;
        serde_json::from_value(result).map_err(|e| UpstreamError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    async fn http_dispatcher(server: &Server) -> UpstreamDispatcher {
        UpstreamDispatcher::new(Endpoint::parse(&server.url()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_send_returns_upstream_reply() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#""method"\s*:\s*"eth_gasPrice""#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc":"2.0","id":7,"result":"0x3b9aca00"}"#)
            .create_async()
            .await;

        let dispatcher = http_dispatcher(&server).await;
        let request = JsonRpcRequest::new("eth_gasPrice", Some(json!([])), json!(7));
        let response = dispatcher.send(&request).await.unwrap();

        assert_eq!(response.result, Some(json!("0x3b9aca00")));
        assert_eq!(*response.id, json!(7));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_2xx_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server.mock("POST", "/").with_status(503).with_body("down").create_async().await;

        let dispatcher = http_dispatcher(&server).await;
        match dispatcher.call("eth_blockNumber", json!([])).await {
            Err(UpstreamError::HttpError(503, body)) => assert_eq!(body, "down"),
            other => panic!("Expected HttpError, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rpc_error_object_is_surfaced_by_call() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"limit exceeded"}}"#)
            .create_async()
            .await;

        let dispatcher = http_dispatcher(&server).await;
        match dispatcher.call("eth_getLogs", json!([{}])).await {
            Err(UpstreamError::RpcError(code, message)) => {
                assert_eq!(code, -32005);
                assert_eq!(message, "limit exceeded");
            }
            other => panic!("Expected RpcError, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let mut server = Server::new_async().await;
        let _mock = server.mock("POST", "/").with_status(200).with_body("<html>").create_async().await;

        let dispatcher = http_dispatcher(&server).await;
        assert!(matches!(
            dispatcher.call("eth_chainId", json!([])).await,
            Err(UpstreamError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_log_source_requests_hex_range() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""method"\s*:\s*"eth_getLogs""#.to_string()),
                Matcher::Regex(r#""fromBlock"\s*:\s*"0x64""#.to_string()),
                Matcher::Regex(r#""toBlock"\s*:\s*"0x44b""#.to_string()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"jsonrpc":"2.0","id":1,"result":[{"address":"0xaa","topics":["0x01"],"data":"0x","blockNumber":"0x65","logIndex":"0x0"}]}"#,
            )
            .create_async()
            .await;

        let dispatcher = http_dispatcher(&server).await;
        let logs = dispatcher.logs_in_range("0xaa", 100, 1099).await.unwrap();

        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].block(), Some(101));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_head_block_number_parses_quantity() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x9c4"}"#)
            .create_async()
            .await;

        let dispatcher = http_dispatcher(&server).await;
        assert_eq!(dispatcher.head_block_number().await.unwrap(), 2500);
    }

    #[tokio::test]
    async fn test_socket_call_times_out() {
        // accepts TCP but never completes the websocket handshake
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _accept = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let dispatcher = UpstreamDispatcher::new(Endpoint::parse(&format!("ws://{addr}")).unwrap())
            .unwrap()
            .with_socket_timeout(Duration::from_millis(200));

        match dispatcher.call("eth_blockNumber", json!([])).await {
            Err(UpstreamError::Timeout) => {}
            other => panic!("Expected Timeout, got: {other:?}"),
        }
    }
}
