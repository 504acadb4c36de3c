use super::{BoundDirection, Store, StoreError};
use crate::utils::hex::{normalize_number, parse_quantity};
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::{
    collections::{BTreeMap, HashMap},
    ops::Bound,
};

type PartitionKey = (u32, String);

/// Ordered set keyed by `(score, id)`, with an id index for replacement.
#[derive(Debug, Default)]
struct ScoredSet {
    scores: HashMap<String, u64>,
    members: BTreeMap<(u64, String), String>,
}

impl ScoredSet {
    fn upsert(&mut self, score: u64, id: &str, value: &str) {
        if let Some(previous) = self.scores.insert(id.to_string(), score) {
            self.members.remove(&(previous, id.to_string()));
        }
        self.members.insert((score, id.to_string()), value.to_string());
    }

    fn range(&self, min: u64, max: u64) -> Vec<(u64, String)> {
        self.members
            .range((Bound::Included((min, String::new())), Bound::Unbounded))
            .take_while(|((score, _), _)| *score <= max)
            .map(|((score, _), value)| (*score, value.clone()))
            .collect()
    }
}

/// Process-local [`Store`] backed by concurrent maps.
///
/// Bound extension runs under the map's per-entry lock, so concurrent extensions of one marker
/// are serialized.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: DashMap<PartitionKey, String>,
    sets: DashMap<PartitionKey, ScoredSet>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, partition: u32, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(&(partition, key.to_string())).map(|v| v.value().clone()))
    }

    async fn set(&self, partition: u32, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert((partition, key.to_string()), value.to_string());
        Ok(())
    }

    async fn extend_bound(
        &self,
        partition: u32,
        key: &str,
        candidate: u64,
        direction: BoundDirection,
    ) -> Result<u64, StoreError> {
        match self.values.entry((partition, key.to_string())) {
            Entry::Occupied(mut occupied) => {
                let current = parse_quantity(occupied.get()).ok_or_else(|| StoreError::Corrupt {
                    key: key.to_string(),
                    value: occupied.get().clone(),
                })?;
                let next = direction.resolve(Some(current), candidate);
                if next != current {
                    occupied.insert(normalize_number(next));
                }
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(normalize_number(candidate));
                Ok(candidate)
            }
        }
    }

    async fn put_scored(
        &self,
        partition: u32,
        key: &str,
        score: u64,
        id: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.sets.entry((partition, key.to_string())).or_default().upsert(score, id, value);
        Ok(())
    }

    async fn range_by_score(
        &self,
        partition: u32,
        key: &str,
        min: u64,
        max: u64,
    ) -> Result<Vec<(u64, String)>, StoreError> {
        if min > max {
            return Ok(Vec::new());
        }
        Ok(self.sets.get(&(partition, key.to_string())).map(|set| set.range(min, max)).unwrap_or_default())
    }
}
