//! Ingestion: mirror a chain's confirmed entries into the store.
//!
//! At most one pass runs per chain. A trigger that arrives while a pass is
//! running asks for exactly one follow-up pass; any further triggers before
//! that pass starts are folded into it.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use foa_network::{NetworkEntry, NetworkGateway};
use foa_store::{MirroredEntry, ObjectStore};
use foa_types::{ChainId, SyncStatus};
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::config::SyncConfig;
use crate::error::{NotFoundKind, SyncError, SyncResult};
use crate::retry::{timed, with_backoff};
use crate::status::settle_chain;

/// Outcome of one ingestion pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassReport {
    /// Entries written to the store during the pass.
    pub mirrored: usize,
    pub synced_height: u64,
    pub status: SyncStatus,
}

/// Background worker that walks the network's entries for a chain.
pub struct IngestionWorker {
    store: Arc<dyn ObjectStore>,
    network: Arc<dyn NetworkGateway>,
    config: SyncConfig,
    slots: Mutex<HashMap<ChainId, Slot>>,
    passes: AtomicU64,
}

struct Slot {
    rerun: bool,
    /// Passes started for this chain so far.
    started: u64,
    finished: watch::Sender<Finished>,
}

/// The last finished pass of a slot and what it produced.
#[derive(Clone)]
struct Finished {
    pass: u64,
    outcome: Option<SyncResult<PassReport>>,
}

impl Slot {
    fn new() -> Self {
        let (finished, _) = watch::channel(Finished {
            pass: 0,
            outcome: None,
        });
        Self {
            rerun: false,
            started: 0,
            finished,
        }
    }
}

/// Resolves once a pass that started after the trigger has finished.
#[must_use = "dropping the handle does not cancel ingestion"]
pub struct IngestHandle {
    chain_id: ChainId,
    target: u64,
    finished: watch::Receiver<Finished>,
}

impl IngestHandle {
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Wait for the pass and return its report.
    ///
    /// When triggers were folded together, every handle sees the outcome of
    /// the shared pass.
    pub async fn wait(mut self) -> SyncResult<PassReport> {
        let target = self.target;
        let finished = self
            .finished
            .wait_for(|finished| finished.pass >= target)
            .await
            .map_err(|_| SyncError::SyncUnavailable("ingestion worker stopped".into()))?;
        let outcome = finished.outcome.clone();
        outcome.unwrap_or_else(|| Err(SyncError::SyncUnavailable("ingestion pass did not run".into())))
    }
}

impl IngestionWorker {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        network: Arc<dyn NetworkGateway>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            network,
            config,
            slots: Mutex::new(HashMap::new()),
            passes: AtomicU64::new(0),
        }
    }

    /// Request an ingestion pass for `chain_id`.
    ///
    /// Starts a pass if none is running, otherwise schedules one follow-up
    /// pass after the running one. This is the only way to run a pass.
    pub fn trigger(self: &Arc<Self>, chain_id: ChainId) -> IngestHandle {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let (slot, target) = match slots.entry(chain_id) {
            Entry::Occupied(occupied) => {
                let slot = occupied.into_mut();
                slot.rerun = true;
                let target = slot.started + 1;
                (slot, target)
            }
            Entry::Vacant(vacant) => {
                let slot = vacant.insert(Slot::new());
                slot.started = 1;
                tokio::spawn(Arc::clone(self).run(chain_id));
                (slot, 1)
            }
        };
        IngestHandle {
            chain_id,
            target,
            finished: slot.finished.subscribe(),
        }
    }

    /// Whether a pass is running for `chain_id`.
    pub fn is_running(&self, chain_id: &ChainId) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(chain_id)
    }

    /// Chains with a pass running or scheduled.
    pub fn active_chains(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Total passes run by this worker, across all chains.
    pub fn passes_run(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    /// Drives passes for one slot; the slot is dropped once no rerun is due.
    async fn run(self: Arc<Self>, chain_id: ChainId) {
        loop {
            self.passes.fetch_add(1, Ordering::SeqCst);
            let outcome = self.run_pass(chain_id).await;
            if let Err(err) = &outcome {
                warn!(chain = %chain_id, error = %err, "ingestion pass failed");
            }

            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(slot) = slots.get_mut(&chain_id) else {
                return;
            };
            slot.finished.send_replace(Finished {
                pass: slot.started,
                outcome: Some(outcome),
            });
            if slot.rerun {
                slot.rerun = false;
                slot.started += 1;
            } else {
                // Waiting handles already observed the final pass above.
                slots.remove(&chain_id);
                return;
            }
        }
    }

    /// Mirror every confirmed entry past the chain's synced height.
    #[instrument(skip_all, fields(chain = %chain_id))]
    async fn run_pass(&self, chain_id: ChainId) -> SyncResult<PassReport> {
        let chain = self
            .store
            .chain(&chain_id)?
            .ok_or(SyncError::NotFound(NotFoundKind::Chain))?;
        let page_size = self.config.ingest_page_size;
        let mut height = chain.synced_height;
        let mut mirrored = 0;

        loop {
            let page = match self.fetch_page(chain_id, height).await {
                Ok(page) => page,
                Err(SyncError::NotFound(NotFoundKind::Chain)) => {
                    debug!("chain is not on the network yet");
                    return Ok(PassReport {
                        mirrored,
                        synced_height: height,
                        status: chain.status,
                    });
                }
                Err(err) => return Err(err),
            };
            let caught_up = page.len() < page_size;
            for entry in page {
                height = self.store.mirror_entry(MirroredEntry {
                    entry_hash: entry.entry_hash,
                    chain_id,
                    ext_ids: entry.ext_ids,
                    content: entry.content,
                    position: entry.position,
                })?;
                mirrored += 1;
            }
            debug!(height, "page mirrored");
            if caught_up {
                break;
            }
        }

        let status = settle_chain(self.store.as_ref(), &chain_id, height)?;
        debug!(mirrored, height, %status, "ingestion pass finished");
        Ok(PassReport {
            mirrored,
            synced_height: height,
            status,
        })
    }

    async fn fetch_page(&self, chain_id: ChainId, height: u64) -> SyncResult<Vec<NetworkEntry>> {
        let network = &self.network;
        let timeout = self.config.network_timeout;
        let limit = self.config.ingest_page_size;
        with_backoff(&self.config.retry, || async move {
            let page = timed(timeout, network.fetch_entries_since(&chain_id, height, limit)).await?;
            check_contiguous(&chain_id, height, &page)?;
            Ok(page)
        })
        .await
    }
}

/// A page must continue the mirror exactly at `height`.
fn check_contiguous(chain_id: &ChainId, height: u64, page: &[NetworkEntry]) -> SyncResult<()> {
    for (offset, entry) in page.iter().enumerate() {
        let expected = height + offset as u64;
        if entry.position != expected || entry.chain_id != *chain_id {
            return Err(SyncError::SyncUnavailable(format!(
                "gap in chain {chain_id}: expected position {expected}, network returned {}",
                entry.position
            )));
        }
    }
    Ok(())
}
