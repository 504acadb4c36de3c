//! In-memory chain head of one network.
//!
//! Two values are tracked separately:
//!
//! - the highest block number *announced* by the head subscription, updated the moment a header
//!   arrives
//! - the *published* latest block, replaced only after the synchronizer has caught up to it
//!
//! Requests only ever see the published block, so a cached log range is never trusted for a
//! head the synchronizer has not reached yet.

use arc_swap::ArcSwapOption;
use serde_json::Value;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// A published latest block: its number and the shallow block object.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestBlock {
    pub number: u64,
    pub header: Value,
}

/// Lock-free holder of a network's head.
#[derive(Debug, Default)]
pub struct ChainHead {
    announced: AtomicU64,
    latest: ArcSwapOption<LatestBlock>,
}

impl ChainHead {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an announced head. Returns `true` if it is the highest seen so far.
    pub fn announce(&self, number: u64) -> bool {
        let previous = self.announced.fetch_max(number, Ordering::AcqRel);
        number > previous
    }

    #[must_use]
    pub fn announced(&self) -> u64 {
        self.announced.load(Ordering::Acquire)
    }

    /// Whether no head newer than `number` has been announced.
    #[must_use]
    pub fn is_newest(&self, number: u64) -> bool {
        self.announced() <= number
    }

    #[must_use]
    pub fn latest(&self) -> Option<Arc<LatestBlock>> {
        self.latest.load_full()
    }

    #[must_use]
    pub fn latest_number(&self) -> Option<u64> {
        self.latest.load().as_ref().map(|block| block.number)
    }

    /// Publishes `block` unless a newer head was announced or published meanwhile.
    ///
    /// Returns whether the block was published.
    pub fn publish_if_newest(&self, block: LatestBlock) -> bool {
        if !self.is_newest(block.number) {
            return false;
        }

        let number = block.number;
        let block = Arc::new(block);
        let previous = self.latest.rcu(|current| match current {
            Some(current) if current.number > number => Some(Arc::clone(current)),
            _ => Some(Arc::clone(&block)),
        });
        previous.as_ref().map_or(true, |previous| previous.number <= number)
    }
}
