//! Write admission and the per-chain submission queue.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use foa_crypto::{ComposedChain, ComposedEntry};
use foa_network::{NetworkError, NetworkGateway};
use foa_store::{ObjectStore, PendingWrite, QueuedWrite, StoreError, WriteTarget};
use foa_types::{Chain, ChainId, Content, Entry, ExtId, SyncStatus, User};
use tracing::{debug, info, instrument, warn};

use crate::config::SyncConfig;
use crate::error::{NotFoundKind, SyncError, SyncResult};
use crate::locks::KeyedLocks;
use crate::retry::timed;
use crate::status::StatusTracker;

/// Result of an admitted write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Admitted<T> {
    /// The stored object after admission.
    pub record: T,
    /// `false` when the object already existed and nothing was charged.
    pub created: bool,
}

#[derive(Default)]
struct Flushed {
    submitted: usize,
    /// Writes the network refused for good, already dropped from the queue.
    refused: Vec<(WriteTarget, NetworkError)>,
}

/// Validates writes, charges quotas, and submits queued writes in order.
pub struct WriteAdmission {
    store: Arc<dyn ObjectStore>,
    network: Arc<dyn NetworkGateway>,
    tracker: Arc<StatusTracker>,
    config: SyncConfig,
    chain_locks: KeyedLocks<ChainId>,
}

impl WriteAdmission {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        network: Arc<dyn NetworkGateway>,
        tracker: Arc<StatusTracker>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            network,
            tracker,
            config,
            chain_locks: KeyedLocks::new(),
        }
    }

    /// Admit a new chain. Costs 2 usage units.
    #[instrument(skip_all, fields(user = %user.id))]
    pub async fn admit_chain(
        &self,
        user: &User,
        ext_ids: Vec<ExtId>,
        content: Content,
    ) -> SyncResult<Admitted<Chain>> {
        ensure_enabled(user)?;
        let composed = ComposedChain::compose(ext_ids, content)?;
        let chain_id = composed.chain_id;

        if let Some(existing) = self.store.chain(&chain_id)? {
            return self.existing_chain(user, existing);
        }

        let now = Utc::now();
        let first = composed.first_entry;
        let write = PendingWrite::Chain {
            chain: Chain {
                chain_id,
                ext_ids: first.ext_ids.clone(),
                content: Some(first.content.clone()),
                first_entry_hash: first.entry_hash,
                status: SyncStatus::Queued,
                owners: BTreeSet::new(),
                created_at: now,
                synced_height: 0,
                network_ref: None,
                write_seq: None,
            },
            first_entry: Entry {
                entry_hash: first.entry_hash,
                chain_id,
                ext_ids: first.ext_ids,
                content: first.content,
                status: SyncStatus::Queued,
                position: None,
                created_at: now,
                network_ref: None,
                write_seq: None,
            },
        };

        match self.store.admit(&user.id, write) {
            Ok(admission) => {
                info!(chain = %chain_id, write_seq = admission.write_seq, usage = admission.user.usage, "chain admitted");
            }
            Err(StoreError::Conflict(_)) => {
                let existing = self
                    .store
                    .chain(&chain_id)?
                    .ok_or(SyncError::NotFound(NotFoundKind::Chain))?;
                return self.existing_chain(user, existing);
            }
            Err(err) => return Err(err.into()),
        }

        self.flush_after_admission(chain_id, WriteTarget::Chain(chain_id))
            .await?;
        let record = self
            .store
            .chain(&chain_id)?
            .ok_or(SyncError::NotFound(NotFoundKind::Chain))?;
        Ok(Admitted {
            record,
            created: true,
        })
    }

    /// Admit a new entry into an existing chain. Costs 1 usage unit.
    ///
    /// A chain known only to the network is discovered first.
    #[instrument(skip_all, fields(user = %user.id, chain = %chain_id))]
    pub async fn admit_entry(
        &self,
        user: &User,
        chain_id: ChainId,
        ext_ids: Vec<ExtId>,
        content: Content,
    ) -> SyncResult<Admitted<Entry>> {
        ensure_enabled(user)?;
        let composed = ComposedEntry::compose(chain_id, ext_ids, content)?;
        let entry_hash = composed.entry_hash;

        if let Some(existing) = self.store.entry(&entry_hash)? {
            debug!(entry = %entry_hash, "entry already exists");
            return Ok(Admitted {
                record: existing,
                created: false,
            });
        }

        if self.store.chain(&chain_id)?.is_none()
            && self
                .tracker
                .discover_chain(&chain_id, Some(user.id))
                .await?
                .is_none()
        {
            return Err(SyncError::NotFound(NotFoundKind::Chain));
        }

        let write = PendingWrite::Entry(Entry {
            entry_hash,
            chain_id,
            ext_ids: composed.ext_ids,
            content: composed.content,
            status: SyncStatus::Queued,
            position: None,
            created_at: Utc::now(),
            network_ref: None,
            write_seq: None,
        });

        match self.store.admit(&user.id, write) {
            Ok(admission) => {
                info!(entry = %entry_hash, write_seq = admission.write_seq, usage = admission.user.usage, "entry admitted");
            }
            Err(StoreError::Conflict(_)) => {
                let existing = self
                    .store
                    .entry(&entry_hash)?
                    .ok_or(SyncError::NotFound(NotFoundKind::Entry))?;
                return Ok(Admitted {
                    record: existing,
                    created: false,
                });
            }
            Err(err) => return Err(err.into()),
        }
        self.store.add_owner(&chain_id, &user.id)?;

        self.flush_after_admission(chain_id, WriteTarget::Entry(entry_hash))
            .await?;
        let record = self
            .store
            .entry(&entry_hash)?
            .ok_or(SyncError::NotFound(NotFoundKind::Entry))?;
        Ok(Admitted {
            record,
            created: true,
        })
    }

    /// Submit the queued writes of one chain, oldest admission first.
    ///
    /// Stops at the first transient failure so nothing is submitted ahead of
    /// an earlier write. A write the network refuses outright is dropped
    /// from the queue and the flush moves on. Returns how many writes were
    /// submitted.
    pub async fn flush_chain(&self, chain_id: ChainId) -> SyncResult<usize> {
        self.submit_queue(chain_id).await.map(|flushed| flushed.submitted)
    }

    #[instrument(skip_all, fields(chain = %chain_id))]
    async fn submit_queue(&self, chain_id: ChainId) -> SyncResult<Flushed> {
        let _guard = self.chain_locks.lock(&chain_id).await;
        let writes = self.store.queued_writes(&chain_id)?;
        let mut flushed = Flushed::default();

        for write in writes {
            let result = match &write {
                QueuedWrite::Chain(chain) => {
                    let content = chain.content.clone().unwrap_or_else(|| Content::new(Vec::new()));
                    let composed = ComposedChain::compose(chain.ext_ids.clone(), content)?;
                    timed(self.config.network_timeout, self.network.submit_chain(&composed)).await
                }
                QueuedWrite::Entry(entry) => {
                    let composed = ComposedEntry::compose(
                        entry.chain_id,
                        entry.ext_ids.clone(),
                        entry.content.clone(),
                    )?;
                    timed(self.config.network_timeout, self.network.submit_entry(&composed)).await
                }
            };

            let network_ref = match result {
                Ok(network_ref) => Some(network_ref),
                Err(NetworkError::AlreadyExists) => {
                    debug!(object = ?write.target(), "already on the network");
                    None
                }
                Err(err) if err.is_transient() => {
                    warn!(object = ?write.target(), error = %err, "submission failed, keeping queue");
                    return Err(err.into());
                }
                Err(err) => {
                    warn!(object = ?write.target(), error = %err, "network refused the write, dropping it");
                    self.store.discard_write(write.target())?;
                    flushed.refused.push((write.target(), err));
                    continue;
                }
            };
            self.store.mark_submitted(write.target(), network_ref)?;
            flushed.submitted += 1;
        }

        if flushed.submitted > 0 {
            debug!(submitted = flushed.submitted, "queue flushed");
        }
        Ok(flushed)
    }

    /// Flush every chain that still has queued writes.
    ///
    /// Returns the number of writes submitted across all chains.
    pub async fn flush_all(&self) -> SyncResult<usize> {
        let mut submitted = 0;
        for chain_id in self.store.chains_with_queued_writes()? {
            match self.flush_chain(chain_id).await {
                Ok(n) => submitted += n,
                Err(err) if err.is_transient() => {
                    debug!(chain = %chain_id, error = %err, "flush deferred");
                }
                Err(err) => warn!(chain = %chain_id, error = %err, "flush failed"),
            }
        }
        Ok(submitted)
    }

    /// Flush after an admission. A transient failure leaves the write
    /// queued and is not an error; a refusal of `target` itself is.
    async fn flush_after_admission(&self, chain_id: ChainId, target: WriteTarget) -> SyncResult<()> {
        match self.submit_queue(chain_id).await {
            Ok(flushed) => match flushed.refused.into_iter().find(|(t, _)| *t == target) {
                Some((_, err)) => Err(err.into()),
                None => Ok(()),
            },
            Err(err) => {
                warn!(chain = %chain_id, error = %err, "write stays queued");
                Ok(())
            }
        }
    }

    fn existing_chain(&self, user: &User, existing: Chain) -> SyncResult<Admitted<Chain>> {
        debug!(chain = %existing.chain_id, "chain already exists");
        if !existing.is_owned_by(&user.id) {
            self.store.add_owner(&existing.chain_id, &user.id)?;
        }
        let record = self
            .store
            .chain(&existing.chain_id)?
            .ok_or(SyncError::NotFound(NotFoundKind::Chain))?;
        Ok(Admitted {
            record,
            created: false,
        })
    }
}

fn ensure_enabled(user: &User) -> SyncResult<()> {
    if user.enabled {
        Ok(())
    } else {
        Err(SyncError::Unauthorized(format!("user {} is disabled", user.name)))
    }
}
