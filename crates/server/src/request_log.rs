use moka::sync::Cache;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

/// How long a served request keeps counting towards `/request-count`.
pub const REQUEST_LOG_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Rolling log of served RPC requests.
///
/// Each request is an entry that expires after the TTL, so the entry count is the number of
/// requests served in the trailing window.
#[derive(Clone)]
pub struct RequestLog {
    entries: Cache<u64, Arc<str>>,
    sequence: Arc<AtomicU64>,
}

impl RequestLog {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(REQUEST_LOG_TTL)
    }

    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder().time_to_live(ttl).build(),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record(&self, method: &str) {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(seq, Arc::from(method));
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }
}

impl Default for RequestLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RequestLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLog").field("count", &self.entries.entry_count()).finish()
    }
}
