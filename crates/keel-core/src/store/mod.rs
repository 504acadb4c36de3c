//! Network-partitioned persistent key space.
//!
//! Two shapes of data are stored, both addressed by `(partition, key)`:
//!
//! - plain string values (cached blocks and transactions, bound markers)
//! - ordered sets of string members, each with a numeric score (event logs scored by block
//!   number), retrievable by inclusive score range
//!
//! Each chain id maps to one partition (see [`crate::config::StorageConfig`]), so networks
//! never see each other's keys. [`PartitionedStore`] binds a [`Store`] to a single partition
//! and is what the rest of the crate holds.
//!
//! # Backends
//!
//! - [`SqliteStore`]: durable, `sqlx` + `SQLite`
//! - [`MemoryStore`]: process-local, used in tests and for `database_url = "memory"`

pub mod keys;
pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::sync::Arc;

/// Errors raised by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt value under {key}: {value}")]
    Corrupt { key: String, value: String },

    #[error("Value out of range: {0}")]
    OutOfRange(u64),
}

/// Which way a bound marker may move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundDirection {
    /// Keep the smallest value ever offered (scan start).
    Lower,
    /// Keep the largest value ever offered (scan end).
    Upper,
}

impl BoundDirection {
    /// Returns the value the marker holds after `candidate` is offered to `current`.
    #[must_use]
    pub fn resolve(self, current: Option<u64>, candidate: u64) -> u64 {
        match (self, current) {
            (_, None) => candidate,
            (Self::Lower, Some(current)) => current.min(candidate),
            (Self::Upper, Some(current)) => current.max(candidate),
        }
    }
}

/// Storage backend contract.
///
/// Implementations must make [`extend_bound`](Store::extend_bound) atomic with respect to
/// concurrent callers: two racing extensions must never leave a marker less extended than the
/// most extended candidate.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, partition: u32, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, partition: u32, key: &str, value: &str) -> Result<(), StoreError>;

    /// Compare-and-set of a hex-encoded block marker that only moves outward. Returns the value
    /// the marker holds afterwards.
    async fn extend_bound(
        &self,
        partition: u32,
        key: &str,
        candidate: u64,
        direction: BoundDirection,
    ) -> Result<u64, StoreError>;

    /// Inserts or replaces the member `id` of the ordered set under `key`.
    async fn put_scored(
        &self,
        partition: u32,
        key: &str,
        score: u64,
        id: &str,
        value: &str,
    ) -> Result<(), StoreError>;

    /// Members with `min <= score <= max`, in score order.
    async fn range_by_score(
        &self,
        partition: u32,
        key: &str,
        min: u64,
        max: u64,
    ) -> Result<Vec<(u64, String)>, StoreError>;
}

/// Opens the backend named by a database URL: `memory` or an `SQLite` URL.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if the `SQLite` database cannot be opened or migrated.
pub async fn connect(database_url: &str) -> Result<Arc<dyn Store>, StoreError> {
    if database_url == "memory" {
        tracing::info!("using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    tracing::info!(database_url = %database_url, "opening sqlite store");
    Ok(Arc::new(SqliteStore::new(database_url).await?))
}

/// A [`Store`] bound to one network's partition.
#[derive(Clone)]
pub struct PartitionedStore {
    inner: Arc<dyn Store>,
    partition: u32,
}

impl std::fmt::Debug for PartitionedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedStore").field("partition", &self.partition).finish()
    }
}

impl PartitionedStore {
    #[must_use]
    pub fn new(inner: Arc<dyn Store>, partition: u32) -> Self {
        Self { inner, partition }
    }

    #[must_use]
    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// # Errors
    /// Propagates backend failures.
    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(self.partition, key).await
    }

    /// # Errors
    /// Propagates backend failures.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(self.partition, key, value).await
    }

    /// # Errors
    /// Propagates backend failures.
    pub async fn extend_bound(
        &self,
        key: &str,
        candidate: u64,
        direction: BoundDirection,
    ) -> Result<u64, StoreError> {
        self.inner.extend_bound(self.partition, key, candidate, direction).await
    }

    /// # Errors
    /// Propagates backend failures.
    pub async fn put_scored(
        &self,
        key: &str,
        score: u64,
        id: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.inner.put_scored(self.partition, key, score, id, value).await
    }

    /// # Errors
    /// Propagates backend failures.
    pub async fn range_by_score(
        &self,
        key: &str,
        min: u64,
        max: u64,
    ) -> Result<Vec<(u64, String)>, StoreError> {
        self.inner.range_by_score(self.partition, key, min, max).await
    }
}
