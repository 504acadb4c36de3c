use super::UpstreamError;
use crate::types::{JsonRpcRequest, JsonRpcResponse};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use url::Url;

/// HTTP transport for upstream calls.
///
/// Requests carry no overall timeout; only connection establishment is bounded.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn new() -> Result<Self, UpstreamError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .use_rustls_tls()
            .user_agent(concat!("keel/", env!("CARGO_PKG_VERSION")))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                UpstreamError::ConnectionFailed(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self { client })
    }

    /// POSTs one request and decodes the JSON-RPC reply.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::Network`] if the request could not be sent
    /// - [`UpstreamError::HttpError`] on a non-2xx status
    /// - [`UpstreamError::InvalidResponse`] if the body is not a JSON-RPC response
    pub async fn send(
        &self,
        url: &Url,
        request: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, UpstreamError> {
        let response = self.client.post(url.clone()).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), method = %request.method, "upstream returned error status");
            return Err(UpstreamError::HttpError(status.as_u16(), body));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| UpstreamError::InvalidResponse(e.to_string()))
    }
}
