//! Socket transport: one connection per call.

use super::UpstreamError;
use crate::types::{JsonRpcRequest, JsonRpcResponse};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

/// Bound on a whole socket call, connection included.
pub const SOCKET_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens a connection, sends `request`, returns the first data message and closes.
///
/// The connection is dropped on every path, including timeout.
///
/// # Errors
///
/// - [`UpstreamError::Timeout`] if no reply arrives within `timeout`
/// - [`UpstreamError::ConnectionFailed`] if the socket cannot be opened or closes early
/// - [`UpstreamError::InvalidResponse`] if the reply is not a JSON-RPC response
pub async fn call_once(
    url: &Url,
    request: &JsonRpcRequest,
    timeout: Duration,
) -> Result<JsonRpcResponse, UpstreamError> {
    let payload =
        serde_json::to_string(request).map_err(|e| UpstreamError::InvalidRequest(e.to_string()))?;

    match tokio::time::timeout(timeout, exchange(url, payload)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(method = %request.method, timeout_secs = timeout.as_secs(), "socket call timed out");
            Err(UpstreamError::Timeout)
        }
    }
}

async fn exchange(url: &Url, payload: String) -> Result<JsonRpcResponse, UpstreamError> {
    let (mut stream, _) = connect_async(url.as_str())
        .await
        .map_err(|e| UpstreamError::ConnectionFailed(format!("WebSocket connection failed: {e}")))?;

    stream
        .send(Message::Text(payload.into()))
        .await
        .map_err(|e| UpstreamError::ConnectionFailed(format!("WebSocket send error: {e}")))?;

    let reply = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => break text.as_str().to_owned(),
            Some(Ok(Message::Binary(bytes))) => {
                break String::from_utf8(bytes.to_vec())
                    .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(UpstreamError::ConnectionFailed(
                    "connection closed before reply".to_string(),
                ))
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                return Err(UpstreamError::ConnectionFailed(format!("WebSocket error: {e}")))
            }
        }
    };

    if let Err(e) = stream.close(None).await {
        tracing::debug!(error = %e, "socket close failed");
    }

    serde_json::from_str(&reply).map_err(|e| UpstreamError::InvalidResponse(e.to_string()))
}
