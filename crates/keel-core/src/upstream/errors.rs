use thiserror::Error;

/// Errors that can occur when calling an upstream node.
///
/// Nothing at this layer retries; every variant is surfaced to the caller as-is.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum UpstreamError {
    /// No reply arrived on the socket transport within the call timeout.
    #[error("Request timeout")]
    Timeout,

    /// Failed to establish or keep a connection to the upstream endpoint.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// HTTP-level error occurred (non-2xx status code).
    ///
    /// First field is the HTTP status code, second is the response body.
    #[error("HTTP error: {0}")]
    HttpError(u16, String),

    /// JSON-RPC error returned by the upstream node.
    ///
    /// First field is the RPC error code, second is the error message.
    #[error("RPC error: {0}")]
    RpcError(i32, String),

    /// Network-level error from the underlying HTTP client.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response from upstream could not be parsed or was malformed.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The request could not be encoded.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The endpoint URL is not HTTP(S) or WS(S).
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl UpstreamError {
    /// Returns `true` if the failure happened before any reply was read.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout | Self::ConnectionFailed(_) | Self::Network(_))
    }

    /// Short label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionFailed(_) | Self::Network(_) => "connection",
            Self::HttpError(..) => "http",
            Self::RpcError(..) => "rpc",
            Self::InvalidResponse(_) => "invalid_response",
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidEndpoint(_) => "invalid_endpoint",
        }
    }
}
