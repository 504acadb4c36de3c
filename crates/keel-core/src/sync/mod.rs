//! Per-network event log synchronization.
//!
//! A [`LogSynchronizer`] owns the backfill and tail walk of every configured contract on one
//! network. Each pass:
//!
//! 1. resolves its target block (the announced head, or the upstream head)
//! 2. for every contract concurrently, reads its scanned range from the
//!    [`RangeBoundTracker`](crate::cache::RangeBoundTracker)
//! 3. walks forward from the range's end to the target, then backward from the range's start to
//!    the contract's genesis block, in fixed-size windows
//! 4. persists each window's logs, then extends the bound over it
//!
//! A failing window aborts that contract's scan for the pass only.

pub mod batch;
pub mod source;
pub mod synchronizer;


pub use source::LogSource;
pub use synchronizer::{LogSynchronizer, PassTarget, SyncState, SyncTicket};

use crate::{store::StoreError, upstream::UpstreamError};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Upstream head could not be resolved")]
    HeadUnavailable,

    #[error("Synchronizer is shutting down")]
    ShuttingDown,
}
