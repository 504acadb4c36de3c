use super::ProxyError;
use crate::{
    cache::{CacheCoordinator, CacheQuery, RangeBoundTracker},
    chain::{ChainHead, LatestBlock},
    config::{AppConfig, ConfigError, NetworkConfig},
    metrics,
    middleware::RequestValidator,
    store::{PartitionedStore, Store},
    sync::{LogSource, LogSynchronizer},
    types::{CacheStatus, JsonRpcRequest, JsonRpcResponse},
    upstream::{Endpoint, HeadListener, HeadSource, HeadSubscriber, UpstreamDispatcher, UpstreamError},
    utils::hex::quantity_from_json,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};

/// Everything keel knows about one network.
///
/// Built once at startup by [`connect`](Self::connect) and shared by every request task and the
/// network's head subscriber for the process lifetime.
pub struct NetworkContext {
    name: String,
    chain_id: u64,
    head: Arc<ChainHead>,
    coordinator: CacheCoordinator,
    synchronizer: Arc<LogSynchronizer>,
    dispatcher: Arc<UpstreamDispatcher>,
    validator: RequestValidator,
    head_source: HeadSource,
}

impl std::fmt::Debug for NetworkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkContext")
            .field("name", &self.name)
            .field("chain_id", &self.chain_id)
            .field("endpoint", &self.dispatcher.endpoint().to_string())
            .field("latest", &self.head.latest_number())
            .finish_non_exhaustive()
    }
}

impl NetworkContext {
    /// Connects to the network's upstream, resolves its chain id and storage partition, and
    /// publishes the current latest block.
    ///
    /// # Errors
    ///
    /// - [`ProxyError::Config`] if the chain id has no partition, a contract lacks a genesis
    ///   block, or the method whitelist is invalid
    /// - [`ProxyError::Upstream`] if the upstream cannot be reached
    pub async fn connect(
        network: &NetworkConfig,
        config: &AppConfig,
        store: Arc<dyn Store>,
    ) -> Result<Arc<Self>, ProxyError> {
        let endpoint = Endpoint::parse(&network.upstream_url).map_err(|_| {
            ConfigError::InvalidUpstreamUrl {
                network: network.name.clone(),
                url: network.upstream_url.clone(),
            }
        })?;
        let dispatcher = Arc::new(UpstreamDispatcher::new(endpoint)?);

        let chain_id = dispatcher.chain_id().await?;
        let partition = config.partition_for(chain_id)?;
        let store = PartitionedStore::new(store, partition);

        let head = Arc::new(ChainHead::new());
        let bounds = Arc::new(RangeBoundTracker::new(store.clone()));
        let coordinator =
            CacheCoordinator::new(store.clone(), Arc::clone(&bounds), Arc::clone(&head), chain_id);
        let synchronizer = LogSynchronizer::new(
            network,
            config.sync.batch_size,
            Arc::clone(&dispatcher) as Arc<dyn LogSource>,
            store,
            bounds,
        )?;
        let validator = RequestValidator::for_network(config.method_whitelist()?, network);

        let head_source = match network.head_socket_url() {
            Some(url) => HeadSource::Subscribe(
                url::Url::parse(url).map_err(|e| UpstreamError::InvalidEndpoint(e.to_string()))?,
            ),
            None => HeadSource::Poll {
                dispatcher: Arc::clone(&dispatcher),
                interval: config.head_poll_interval(),
            },
        };

        let header = dispatcher.latest_block().await?;
        let number = header
            .get("number")
            .and_then(quantity_from_json)
            .ok_or_else(|| UpstreamError::InvalidResponse(format!("latest block: {header}")))?;
        head.announce(number);
        head.publish_if_newest(LatestBlock { number, header });
        metrics::record_chain_head(&network.name, number);

        info!(
            network = %network.name,
            chain_id = chain_id,
            partition = partition,
            latest = number,
            contracts = network.contracts.len(),
            "network connected"
        );

        Ok(Arc::new(Self {
            name: network.name.clone(),
            chain_id,
            head,
            coordinator,
            synchronizer,
            dispatcher,
            validator,
            head_source,
        }))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    #[must_use]
    pub fn head(&self) -> &Arc<ChainHead> {
        &self.head
    }

    #[must_use]
    pub fn synchronizer(&self) -> &Arc<LogSynchronizer> {
        &self.synchronizer
    }

    /// Answers one request: validation, then the cache, then upstream.
    ///
    /// Upstream replies are returned unchanged, JSON-RPC error objects included. Their cacheable
    /// part is persisted in the background and never delays the response.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Validation`] for rejected requests and [`ProxyError::Upstream`] if
    /// the upstream call fails.
    pub async fn handle(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, ProxyError> {
        let method = self.validator.validate(&request)?;
        let query = CacheQuery::classify(method, request.positional_params());

        if query.is_cacheable() {
            match self.coordinator.try_cache(&query).await {
                Ok(Some(result)) => {
                    metrics::record_cache_hit(&self.name, method);
                    debug!(network = %self.name, method = %method.as_str(), "cache hit");
                    return Ok(JsonRpcResponse::cached(result, Arc::clone(&request.id)));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(network = %self.name, method = %method.as_str(), error = %e, "cache read failed");
                }
            }
            metrics::record_cache_miss(&self.name, method);
            debug!(network = %self.name, method = %method.as_str(), "cache miss");
        }

        let mut response = self.dispatcher.send(&request).await.inspect_err(|e| {
            metrics::record_upstream_error(&self.name, e.kind());
        })?;
        response.cache_status = Some(CacheStatus::Miss);

        if query.is_cacheable() && response.error.is_none() {
            if let Some(result) = response.result.clone().filter(|r| !r.is_null()) {
                self.persist_in_background(query, result);
            }
        }

        Ok(response)
    }

    fn persist_in_background(&self, query: CacheQuery, result: Value) {
        let coordinator = self.coordinator.clone();
        let network = self.name.clone();
        tokio::spawn(async move {
            if let Err(e) = coordinator.persist(&query, &result).await {
                warn!(network = %network, error = %e, "failed to persist upstream result");
            }
        });
    }

    /// Starts the head subscriber and an initial sync pass up to the published head.
    pub fn start(self: &Arc<Self>, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        drop(self.synchronizer.request_sync(self.head.latest_number()));

        HeadSubscriber::new(self.name.clone(), self.head_source.clone())
            .spawn(Arc::clone(self) as Arc<dyn HeadListener>, shutdown)
    }

    pub fn shutdown(&self) {
        self.synchronizer.shutdown();
    }
}

#[async_trait]
impl HeadListener for NetworkContext {
    /// Publishes `number` as the latest block once the synchronizer has covered it, unless a
    /// newer head arrived in the meantime.
    async fn on_new_head(&self, number: u64) {
        if !self.head.announce(number) {
            return;
        }
        metrics::record_chain_head(&self.name, number);

        if self.synchronizer.request_sync(Some(number)).wait().await.is_err() {
            return;
        }
        if !self.head.is_newest(number) {
            debug!(network = %self.name, block = number, "newer head announced, skipping publish");
            return;
        }

        match self.dispatcher.block_by_number(number).await {
            Ok(Some(header)) => {
                if self.head.publish_if_newest(LatestBlock { number, header }) {
                    debug!(network = %self.name, block = number, "published latest block");
                }
            }
            Ok(None) => debug!(network = %self.name, block = number, "new head not yet served upstream"),
            Err(e) => {
                metrics::record_upstream_error(&self.name, e.kind());
                warn!(network = %self.name, block = number, error = %e, "failed to fetch new head");
            }
        }
    }
}
