use crate::{
    store::{keys, BoundDirection, PartitionedStore, StoreError},
    utils::hex::{normalize_hash, parse_quantity},
};
use dashmap::DashMap;
use tracing::trace;

/// Inclusive block interval whose logs are fully persisted for one address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressBounds {
    pub earliest: Option<u64>,
    pub latest: Option<u64>,
}

impl AddressBounds {
    /// `(earliest, latest)`, with `(0, 0)` standing for nothing scanned.
    #[must_use]
    pub fn as_pair(&self) -> (u64, u64) {
        (self.earliest.unwrap_or(0), self.latest.unwrap_or(0))
    }

    /// Both ends recorded.
    #[must_use]
    pub fn is_scanned(&self) -> bool {
        self.earliest.is_some() && self.latest.is_some()
    }

    /// Whether `[start, end]` lies inside the scanned interval.
    #[must_use]
    pub fn covers(&self, start: u64, end: u64) -> bool {
        match (self.earliest, self.latest) {
            (Some(earliest), Some(latest)) => earliest <= start && end <= latest,
            _ => false,
        }
    }
}

/// Per-network record of which block range has been log-scanned for each address.
///
/// Reads are memoized: the persistent markers of an address are loaded at most once per process.
/// Extensions go through the store's outward-only compare-and-set and merge the persisted result
/// back into the memo, so a stale memo can never shrink a bound.
#[derive(Debug)]
pub struct RangeBoundTracker {
    store: PartitionedStore,
    memo: DashMap<String, AddressBounds>,
}

impl RangeBoundTracker {
    #[must_use]
    pub fn new(store: PartitionedStore) -> Self {
        Self { store, memo: DashMap::new() }
    }

    /// Returns the known bounds of `address`.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the markers cannot be read or are not hex quantities.
    pub async fn bounds(&self, address: &str) -> Result<AddressBounds, StoreError> {
        let address = normalize_hash(address);
        if let Some(bounds) = self.memo.get(&address) {
            return Ok(*bounds);
        }

        let loaded = AddressBounds {
            earliest: self.load_marker(&keys::logs_earliest(&address)).await?,
            latest: self.load_marker(&keys::logs_latest(&address)).await?,
        };
        trace!(address = %address, earliest = ?loaded.earliest, latest = ?loaded.latest, "loaded bounds");

        // a concurrent extension may have populated the memo while the store was read
        Ok(*self.memo.entry(address).or_insert(loaded))
    }

    /// Lowers `earliest` to `block` if that extends the range.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the marker cannot be updated.
    pub async fn extend_earliest(&self, address: &str, block: u64) -> Result<u64, StoreError> {
        self.extend(address, block, BoundDirection::Lower).await
    }

    /// Raises `latest` to `block` if that extends the range.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the marker cannot be updated.
    pub async fn extend_latest(&self, address: &str, block: u64) -> Result<u64, StoreError> {
        self.extend(address, block, BoundDirection::Upper).await
    }

    async fn extend(
        &self,
        address: &str,
        block: u64,
        direction: BoundDirection,
    ) -> Result<u64, StoreError> {
        let address = normalize_hash(address);
        let current = self.bounds(&address).await?;
        let known = match direction {
            BoundDirection::Lower => current.earliest,
            BoundDirection::Upper => current.latest,
        };

        if let Some(known) = known {
            if direction.resolve(Some(known), block) == known {
                return Ok(known);
            }
        }

        let key = match direction {
            BoundDirection::Lower => keys::logs_earliest(&address),
            BoundDirection::Upper => keys::logs_latest(&address),
        };
        let persisted = self.store.extend_bound(&key, block, direction).await?;

        let mut entry = self.memo.entry(address).or_default();
        match direction {
            BoundDirection::Lower => {
                entry.earliest = Some(direction.resolve(entry.earliest, persisted));
            }
            BoundDirection::Upper => {
                entry.latest = Some(direction.resolve(entry.latest, persisted));
            }
        }
        Ok(persisted)
    }

    async fn load_marker(&self, key: &str) -> Result<Option<u64>, StoreError> {
        match self.store.get(key).await? {
            Some(value) => parse_quantity(&value)
                .map(Some)
                .ok_or_else(|| StoreError::Corrupt { key: key.to_string(), value }),
            None => Ok(None),
        }
    }
}
