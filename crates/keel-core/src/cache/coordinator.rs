use super::{
    bounds::RangeBoundTracker,
    query::{CacheQuery, LogQuery},
};
use crate::{
    chain::ChainHead,
    store::{keys, PartitionedStore, StoreError},
    types::LogEntry,
    utils::hex::normalize_number,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

/// Decides per request whether the cache can answer, and what to keep from upstream answers.
///
/// The coordinator only ever writes block and transaction entries; log entries and bound
/// markers belong to the [`LogSynchronizer`](crate::sync::LogSynchronizer).
#[derive(Debug, Clone)]
pub struct CacheCoordinator {
    store: PartitionedStore,
    bounds: Arc<RangeBoundTracker>,
    head: Arc<ChainHead>,
    chain_id: u64,
}

impl CacheCoordinator {
    #[must_use]
    pub fn new(
        store: PartitionedStore,
        bounds: Arc<RangeBoundTracker>,
        head: Arc<ChainHead>,
        chain_id: u64,
    ) -> Self {
        Self { store, bounds, head, chain_id }
    }

    /// Attempts to answer `query` locally. `Ok(None)` is a miss.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the store cannot be read or holds malformed entries.
    pub async fn try_cache(&self, query: &CacheQuery) -> Result<Option<Value>, StoreError> {
        match query {
            CacheQuery::ChainId => Ok(Some(Value::String(normalize_number(self.chain_id)))),
            CacheQuery::BlockNumber => {
                Ok(self.head.latest_number().map(|n| Value::String(normalize_number(n))))
            }
            CacheQuery::LatestBlock => Ok(self.head.latest().map(|block| block.header.clone())),
            CacheQuery::BlockByNumber { number, full } => {
                self.read_value(&keys::block(*number, *full)).await
            }
            CacheQuery::TransactionByHash { hash } => {
                self.read_value(&keys::transaction(hash)).await
            }
            CacheQuery::Logs(logs) => self.read_logs(logs).await,
            CacheQuery::Uncached => Ok(None),
        }
    }

    /// Persists the cacheable part of an upstream result. `null` results are never kept.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the write fails.
    pub async fn persist(&self, query: &CacheQuery, result: &Value) -> Result<(), StoreError> {
        if result.is_null() {
            return Ok(());
        }

        let key = match query {
            CacheQuery::BlockByNumber { number, full } => keys::block(*number, *full),
            CacheQuery::TransactionByHash { hash } => keys::transaction(hash),
            _ => return Ok(()),
        };

        trace!(key = %key, "persisting upstream result");
        self.store.set(&key, &result.to_string()).await
    }

    async fn read_value(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.store.get(key).await?.map(decode))
    }

    async fn read_logs(&self, query: &LogQuery) -> Result<Option<Value>, StoreError> {
        let Some(latest) = self.head.latest_number() else {
            debug!("no latest block published, log query is a miss");
            return Ok(None);
        };

        // only the upper end is clamped; a range starting past the head is a miss
        let start = query.from.resolve(latest);
        let end = query.to.resolve(latest).min(latest);
        if start > end {
            return Ok(None);
        }

        for address in &query.addresses {
            let bounds = self.bounds.bounds(address).await?;
            if !bounds.covers(start, end) {
                debug!(
                    address = %address,
                    start = start,
                    end = end,
                    earliest = ?bounds.earliest,
                    latest = ?bounds.latest,
                    "log range not covered"
                );
                return Ok(None);
            }
        }

        let mut matched = Vec::new();
        for address in &query.addresses {
            let key = keys::log_set(address);
            let mut entries = Vec::new();

            for (_, raw) in self.store.range_by_score(&key, start, end).await? {
                let value: Value = serde_json::from_str(&raw)
                    .map_err(|_| StoreError::Corrupt { key: key.clone(), value: raw.clone() })?;
                let entry = LogEntry::deserialize(&value)
                    .map_err(|_| StoreError::Corrupt { key: key.clone(), value: raw.clone() })?;

                if query.topics.matches(&entry) {
                    entries.push((entry.block(), entry.index(), value));
                }
            }

            entries.sort_by_key(|(block, index, _)| (*block, *index));
            matched.extend(entries.into_iter().map(|(_, _, value)| value));
        }

        Ok(Some(Value::Array(matched)))
    }
}

/// Cached values are stored serialized; anything that does not parse is handed back verbatim.
fn decode(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}
