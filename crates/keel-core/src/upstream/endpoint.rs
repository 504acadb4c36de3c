use super::UpstreamError;
use std::fmt;
use url::Url;

/// Where and how a network's upstream node is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// One-shot `POST` per call.
    Http(Url),
    /// One connection per call: send one request, await one message, close.
    Socket(Url),
}

impl Endpoint {
    /// Parses an upstream URL, choosing the transport from its scheme.
    ///
    /// # Errors
    /// Returns [`UpstreamError::InvalidEndpoint`] for unparsable URLs and any scheme other than
    /// `http`, `https`, `ws` or `wss`.
    pub fn parse(raw: &str) -> Result<Self, UpstreamError> {
        let url = Url::parse(raw.trim()).map_err(|_| UpstreamError::InvalidEndpoint(raw.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(Self::Http(url)),
            "ws" | "wss" => Ok(Self::Socket(url)),
            _ => Err(UpstreamError::InvalidEndpoint(raw.to_string())),
        }
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        match self {
            Self::Http(url) | Self::Socket(url) => url,
        }
    }

    #[must_use]
    pub fn is_socket(&self) -> bool {
        matches!(self, Self::Socket(_))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // host only, paths often carry provider API keys
        let url = self.url();
        write!(f, "{}://{}", url.scheme(), url.host_str().unwrap_or_default())
    }
}
