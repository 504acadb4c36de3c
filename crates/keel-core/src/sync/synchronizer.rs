use super::{
    batch::{backward, forward, Window},
    LogSource, SyncError,
};
use crate::{
    cache::RangeBoundTracker,
    config::{ConfigError, NetworkConfig},
    metrics,
    store::{keys, PartitionedStore},
    utils::hex::normalize_hash,
};
use futures_util::future::join_all;
use parking_lot::Mutex;
use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Coordination state of one network's synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Scanning,
    /// A pass is running and at least one request arrived meanwhile; exactly one more pass
    /// follows.
    ScanningWithPendingRescan,
}

/// Upper block a pass walks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    /// The upstream head, resolved when the pass starts.
    Head,
    Block(u64),
}

impl PassTarget {
    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Block(a), Self::Block(b)) => Self::Block(a.max(b)),
            _ => Self::Head,
        }
    }
}

/// Failed generations older than this many passes are forgotten.
const UNRESOLVED_RETENTION: u64 = 1024;

#[derive(Debug, Clone, Default)]
struct Progress {
    completed: u64,
    closed: bool,
    /// Completed generations whose pass could not resolve the upstream head.
    unresolved: BTreeSet<u64>,
}

#[derive(Debug)]
struct Coordination {
    state: SyncState,
    pending: Option<PassTarget>,
    /// Generation of the most recently started pass.
    started: u64,
}

#[derive(Debug, Clone)]
struct TrackedContract {
    address: String,
    genesis: u64,
}

/// Handle on a requested pass.
#[derive(Debug)]
pub struct SyncTicket {
    generation: u64,
    progress: watch::Receiver<Progress>,
}

impl SyncTicket {
    /// Waits until the pass serving this request has finished.
    ///
    /// A finished pass may still have aborted individual addresses; their bounds only cover
    /// what was persisted.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::HeadUnavailable`] if the pass had to resolve the upstream head and
    /// could not, so nothing was scanned, and [`SyncError::ShuttingDown`] if the synchronizer
    /// stops first.
    pub async fn wait(mut self) -> Result<(), SyncError> {
        let generation = self.generation;
        match self.progress.wait_for(|p| p.completed >= generation || p.closed).await {
            Ok(progress) if progress.completed >= generation => {
                if progress.unresolved.contains(&generation) {
                    Err(SyncError::HeadUnavailable)
                } else {
                    Ok(())
                }
            }
            _ => Err(SyncError::ShuttingDown),
        }
    }
}

/// Backfills and tails the event logs of one network's configured contracts.
///
/// Passes never overlap: a request arriving during a pass is folded into a single follow-up
/// pass. Within a pass every contract is scanned concurrently by its own task, so bound
/// extensions for one address are serialized. Logs of a window are persisted before the bound
/// covering them is extended, so an interrupted pass under-reports progress and never
/// over-reports it.
pub struct LogSynchronizer {
    network: String,
    contracts: Vec<TrackedContract>,
    source: Arc<dyn LogSource>,
    store: PartitionedStore,
    bounds: Arc<RangeBoundTracker>,
    batch_size: u64,
    coordination: Mutex<Coordination>,
    progress: watch::Sender<Progress>,
    shutdown: AtomicBool,
}

impl std::fmt::Debug for LogSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSynchronizer")
            .field("network", &self.network)
            .field("contracts", &self.contracts)
            .field("batch_size", &self.batch_size)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl LogSynchronizer {
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingGenesis`] if a contract has no genesis block.
    pub fn new(
        network: &NetworkConfig,
        batch_size: u64,
        source: Arc<dyn LogSource>,
        store: PartitionedStore,
        bounds: Arc<RangeBoundTracker>,
    ) -> Result<Arc<Self>, ConfigError> {
        let contracts = network
            .contracts
            .iter()
            .map(|contract| {
                contract
                    .genesis_block
                    .map(|genesis| TrackedContract { address: normalize_hash(&contract.address), genesis })
                    .ok_or_else(|| ConfigError::MissingGenesis {
                        network: network.name.clone(),
                        address: contract.address.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (progress, _) = watch::channel(Progress::default());

        Ok(Arc::new(Self {
            network: network.name.clone(),
            contracts,
            source,
            store,
            bounds,
            batch_size: batch_size.max(1),
            coordination: Mutex::new(Coordination {
                state: SyncState::Idle,
                pending: None,
                started: 0,
            }),
            progress,
            shutdown: AtomicBool::new(false),
        }))
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        self.coordination.lock().state
    }

    /// Requests a pass up to `target` (the upstream head if `None`).
    ///
    /// Starts a pass when idle; otherwise schedules the single follow-up pass and widens its
    /// target.
    pub fn request_sync(self: &Arc<Self>, target: Option<u64>) -> SyncTicket {
        let target = target.map_or(PassTarget::Head, PassTarget::Block);
        let progress = self.progress.subscribe();

        if self.shutdown.load(Ordering::Acquire) {
            return SyncTicket { generation: u64::MAX, progress };
        }

        let mut coordination = self.coordination.lock();
        let generation = match coordination.state {
            SyncState::Idle => {
                coordination.state = SyncState::Scanning;
                coordination.started += 1;
                let generation = coordination.started;
                tokio::spawn(Arc::clone(self).run(target, generation));
                generation
            }
            SyncState::Scanning | SyncState::ScanningWithPendingRescan => {
                coordination.state = SyncState::ScanningWithPendingRescan;
                coordination.pending =
                    Some(coordination.pending.map_or(target, |pending| pending.merge(target)));
                coordination.started + 1
            }
        };
        drop(coordination);

        SyncTicket { generation, progress }
    }

    /// Stops before the next window; waiting tickets resolve with
    /// [`SyncError::ShuttingDown`].
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.progress.send_modify(|p| p.closed = true);
        info!(network = %self.network, "log synchronizer stopping");
    }

    async fn run(self: Arc<Self>, mut target: PassTarget, mut generation: u64) {
        loop {
            let resolved = self.run_pass(target).await;
            self.progress.send_modify(|p| {
                p.completed = p.completed.max(generation);
                if !resolved {
                    p.unresolved.insert(generation);
                }
                let floor = p.completed.saturating_sub(UNRESOLVED_RETENTION);
                p.unresolved = p.unresolved.split_off(&floor);
            });

            let next = {
                let mut coordination = self.coordination.lock();
                if coordination.state == SyncState::ScanningWithPendingRescan
                    && !self.shutdown.load(Ordering::Acquire)
                {
                    coordination.state = SyncState::Scanning;
                    coordination.started += 1;
                    Some((coordination.pending.take().unwrap_or(PassTarget::Head), coordination.started))
                } else {
                    coordination.state = SyncState::Idle;
                    coordination.pending = None;
                    None
                }
            };

            match next {
                Some((next_target, next_generation)) => {
                    target = next_target;
                    generation = next_generation;
                }
                None => break,
            }
        }
    }

    /// Returns `false` if the head could not be resolved and nothing was scanned.
    async fn run_pass(&self, target: PassTarget) -> bool {
        let target = match target {
            PassTarget::Block(block) => block,
            PassTarget::Head => match self.source.head_block_number().await {
                Ok(head) => head,
                Err(e) => {
                    warn!(network = %self.network, error = %e, "could not resolve head for sync pass");
                    return false;
                }
            },
        };

        debug!(network = %self.network, target = target, contracts = self.contracts.len(), "sync pass started");

        let scans = self.contracts.iter().map(|contract| self.scan_address(contract, target));
        let results = join_all(scans).await;

        for (contract, result) in self.contracts.iter().zip(results) {
            match result {
                Ok(()) | Err(SyncError::ShuttingDown) => {}
                Err(e) => {
                    metrics::record_sync_batch_failure(&self.network);
                    warn!(
                        network = %self.network,
                        address = %contract.address,
                        error = %e,
                        "address scan aborted"
                    );
                }
            }
        }

        metrics::record_sync_pass(&self.network);
        debug!(network = %self.network, target = target, "sync pass finished");
        true
    }

    async fn scan_address(&self, contract: &TrackedContract, target: u64) -> Result<(), SyncError> {
        if target < contract.genesis {
            return Ok(());
        }

        let bounds = self.bounds.bounds(&contract.address).await?;
        let (Some(earliest), Some(latest)) = (bounds.earliest, bounds.latest) else {
            return self.first_scan(contract, target).await;
        };

        if latest < target {
            for window in forward(latest + 1, target, self.batch_size) {
                self.scan_window(contract, window).await?;
                self.bounds.extend_latest(&contract.address, window.end).await?;
            }
        }

        if earliest > contract.genesis {
            for window in backward(earliest - 1, contract.genesis, self.batch_size) {
                self.scan_window(contract, window).await?;
                self.bounds.extend_earliest(&contract.address, window.start).await?;
            }
        }

        Ok(())
    }

    /// Forward walk of a never-scanned address from its genesis block. `earliest` is recorded
    /// once the first window is persisted.
    async fn first_scan(&self, contract: &TrackedContract, target: u64) -> Result<(), SyncError> {
        info!(
            network = %self.network,
            address = %contract.address,
            genesis = contract.genesis,
            target = target,
            "starting initial log scan"
        );

        for window in forward(contract.genesis, target, self.batch_size) {
            self.scan_window(contract, window).await?;
            if window.start == contract.genesis {
                self.bounds.extend_earliest(&contract.address, contract.genesis).await?;
            }
            self.bounds.extend_latest(&contract.address, window.end).await?;
        }
        Ok(())
    }

    async fn scan_window(&self, contract: &TrackedContract, window: Window) -> Result<(), SyncError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(SyncError::ShuttingDown);
        }

        let logs = self.source.logs_in_range(&contract.address, window.start, window.end).await?;
        let key = keys::log_set(&contract.address);

        let mut persisted = 0usize;
        for log in &logs {
            // pending logs carry no block number
            let (Some(block), Some(id)) = (log.block(), log.member_id()) else {
                continue;
            };
            self.store.put_scored(&key, block, &id, &serde_json::to_string(log)?).await?;
            persisted += 1;
        }

        metrics::record_sync_batch(&self.network);
        debug!(
            network = %self.network,
            address = %contract.address,
            from = window.start,
            to = window.end,
            logs = persisted,
            "synced log window"
        );
        Ok(())
    }
}
