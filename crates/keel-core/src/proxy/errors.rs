use crate::{config::ConfigError, middleware::ValidationError, upstream::UpstreamError};

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid network: {0}")]
    UnknownNetwork(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Transport failures only; JSON-RPC error objects are passed through as responses.
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
