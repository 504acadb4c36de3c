use crate::{types::LogEntry, upstream::UpstreamError};
use async_trait::async_trait;

/// Where the synchronizer reads chain data from.
///
/// Implemented by [`UpstreamDispatcher`](crate::upstream::UpstreamDispatcher); tests substitute
/// an in-memory chain.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Current head block number.
    async fn head_block_number(&self) -> Result<u64, UpstreamError>;

    /// Every log emitted by `address` in the inclusive range `[from, to]`.
    async fn logs_in_range(
        &self,
        address: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<LogEntry>, UpstreamError>;
}
