use super::{NetworkContext, ProxyError};
use crate::types::{JsonRpcRequest, JsonRpcResponse};
use std::{collections::HashMap, sync::Arc};

/// Network contexts by name.
///
/// Clients pick a network through the first label of the host they connect to, so
/// `mainnet.rpc.example.com` is served by the network named `mainnet`.
#[derive(Debug, Default, Clone)]
pub struct NetworkRegistry {
    networks: HashMap<String, Arc<NetworkContext>>,
}

impl NetworkRegistry {
    #[must_use]
    pub fn new(contexts: impl IntoIterator<Item = Arc<NetworkContext>>) -> Self {
        Self {
            networks: contexts
                .into_iter()
                .map(|ctx| (ctx.name().to_ascii_lowercase(), ctx))
                .collect(),
        }
    }

    /// Network label of a `Host` header value: its first label, lower-cased, port ignored.
    #[must_use]
    pub fn network_label(host: &str) -> String {
        let host = host.rsplit_once(':').map_or(host, |(name, port)| {
            if port.chars().all(|c| c.is_ascii_digit()) {
                name
            } else {
                host
            }
        });
        host.split('.').next().unwrap_or_default().to_ascii_lowercase()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<NetworkContext>> {
        self.networks.get(&name.to_ascii_lowercase())
    }

    #[must_use]
    pub fn resolve_host(&self, host: &str) -> Option<&Arc<NetworkContext>> {
        self.networks.get(&Self::network_label(host))
    }

    /// Routes `request` to the network named by `host`.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::UnknownNetwork`] if no network matches, otherwise whatever the
    /// network's handler returns.
    pub async fn handle(
        &self,
        host: &str,
        request: JsonRpcRequest,
    ) -> Result<JsonRpcResponse, ProxyError> {
        let ctx = self
            .resolve_host(host)
            .ok_or_else(|| ProxyError::UnknownNetwork(Self::network_label(host)))?;
        ctx.handle(request).await
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<NetworkContext>> {
        self.networks.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.networks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}
