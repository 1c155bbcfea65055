//! Read side: lookups, listings, and searches over the local mirror.
//!
//! Entry reads follow a strict policy by default: while a chain is still
//! syncing the caller gets [`ReadOutcome::Syncing`] instead of a partial
//! listing, unless it asked for partial data with `force`.

use std::sync::Arc;

use chrono::Utc;
use foa_network::NetworkGateway;
use foa_store::ObjectStore;
use foa_types::{
    Chain, ChainFilter, ChainId, Entry, EntryFilter, EntryHash, ExtId, Page, Pagination,
    SyncStatus, User,
};
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::{NotFoundKind, SyncError, SyncResult};
use crate::retry::timed;
use crate::status::StatusTracker;

/// Result of a read that may have to wait for synchronization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadOutcome<T> {
    Ready(T),
    /// The chain is still being mirrored and partial data was not requested.
    Syncing,
}

impl<T> ReadOutcome<T> {
    pub fn is_syncing(&self) -> bool {
        matches!(self, Self::Syncing)
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Syncing => None,
        }
    }
}

pub struct QueryFacade {
    store: Arc<dyn ObjectStore>,
    network: Arc<dyn NetworkGateway>,
    tracker: Arc<StatusTracker>,
    config: SyncConfig,
}

impl QueryFacade {
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
        }
    }

    /// A chain with its freshly computed status. Chains unknown locally are
    /// looked up on the network. The caller becomes an owner of the chain.
    ///
    /// While the network is unreachable a stored chain is returned with its
    /// stored status.
    pub async fn get_chain(&self, user: &User, chain_id: &ChainId) -> SyncResult<Chain> {
        let stored = self.resolve_chain(user, chain_id).await?;
        if let Err(err) = self.tracker.chain_status(chain_id).await {
            if !err.is_transient() {
                return Err(err);
            }
            debug!(chain = %chain_id, error = %err, "serving stored chain");
            return Ok(stored);
        }
        self.store
            .chain(chain_id)?
            .ok_or(SyncError::NotFound(NotFoundKind::Chain))
    }

    /// An entry with its freshly computed status. Entries unknown locally are
    /// served from the network and their chain is discovered. A stored entry
    /// falls back to its stored status while the network is unreachable.
    pub async fn get_entry(&self, user: &User, entry_hash: &EntryHash) -> SyncResult<Entry> {
        if let Some(stored) = self.store.entry(entry_hash)? {
            if let Err(err) = self.tracker.entry_status(entry_hash).await {
                if !err.is_transient() {
                    return Err(err);
                }
                debug!(entry = %entry_hash, error = %err, "serving stored entry");
                return Ok(stored);
            }
            return self
                .store
                .entry(entry_hash)?
                .ok_or(SyncError::NotFound(NotFoundKind::Entry));
        }

        let remote = timed(self.config.network_timeout, self.network.fetch_entry(entry_hash))
            .await?
            .ok_or(SyncError::NotFound(NotFoundKind::Entry))?;
        if self.store.chain(&remote.chain_id)?.is_none() {
            self.tracker
                .discover_chain(&remote.chain_id, Some(user.id))
                .await?;
        }
        debug!(entry = %entry_hash, "entry served from the network");
        Ok(Entry {
            entry_hash: remote.entry_hash,
            chain_id: remote.chain_id,
            ext_ids: remote.ext_ids,
            content: remote.content,
            status: SyncStatus::Processing,
            position: Some(remote.position),
            created_at: Utc::now(),
            network_ref: None,
            write_seq: None,
        })
    }

    /// The caller's chains in creation order.
    pub fn list_chains(
        &self,
        user: &User,
        status: Option<SyncStatus>,
        page: &Pagination,
    ) -> SyncResult<Page<Chain>> {
        let filter = ChainFilter::owned_by(user.id).with_status(status);
        Ok(self.store.query_chains(&filter, page)?)
    }

    /// The caller's chains whose external ids contain every id in `ext_ids`.
    pub fn search_chains(
        &self,
        user: &User,
        ext_ids: Vec<ExtId>,
        status: Option<SyncStatus>,
        page: &Pagination,
    ) -> SyncResult<Page<Chain>> {
        require_ext_ids(&ext_ids)?;
        let filter = ChainFilter::owned_by(user.id)
            .with_status(status)
            .with_ext_ids(ext_ids);
        Ok(self.store.query_chains(&filter, page)?)
    }

    /// Entries of a chain in ledger order.
    pub async fn chain_entries(
        &self,
        user: &User,
        chain_id: &ChainId,
        status: Option<SyncStatus>,
        page: &Pagination,
        force: bool,
    ) -> SyncResult<ReadOutcome<Page<Entry>>> {
        let filter = EntryFilter::for_chain(*chain_id).with_status(status);
        self.read_entries(user, filter, page, force).await
    }

    /// Entries of a chain whose external ids contain every id in `ext_ids`.
    pub async fn search_entries(
        &self,
        user: &User,
        chain_id: &ChainId,
        ext_ids: Vec<ExtId>,
        status: Option<SyncStatus>,
        page: &Pagination,
        force: bool,
    ) -> SyncResult<ReadOutcome<Page<Entry>>> {
        require_ext_ids(&ext_ids)?;
        let filter = EntryFilter::for_chain(*chain_id)
            .with_status(status)
            .with_ext_ids(ext_ids);
        self.read_entries(user, filter, page, force).await
    }

    async fn read_entries(
        &self,
        user: &User,
        filter: EntryFilter,
        page: &Pagination,
        force: bool,
    ) -> SyncResult<ReadOutcome<Page<Entry>>> {
        let chain = self.resolve_chain(user, &filter.chain_id).await?;
        let status = match self.tracker.chain_status(&filter.chain_id).await {
            Ok(status) => status,
            Err(err) if force && err.is_transient() => {
                debug!(chain = %filter.chain_id, error = %err, "serving stored status");
                chain.status
            }
            Err(err) => return Err(err),
        };
        if !status.is_completed() && !force {
            return Ok(ReadOutcome::Syncing);
        }
        Ok(ReadOutcome::Ready(self.store.query_entries(&filter, page)?))
    }

    /// The stored chain, discovering it on the network if needed, with the
    /// caller linked as an owner.
    async fn resolve_chain(&self, user: &User, chain_id: &ChainId) -> SyncResult<Chain> {
        match self.store.chain(chain_id)? {
            Some(mut chain) => {
                if !chain.is_owned_by(&user.id) {
                    self.store.add_owner(chain_id, &user.id)?;
                    chain.owners.insert(user.id);
                }
                Ok(chain)
            }
            None => self
                .tracker
                .discover_chain(chain_id, Some(user.id))
                .await?
                .ok_or(SyncError::NotFound(NotFoundKind::Chain)),
        }
    }
}

fn require_ext_ids(ext_ids: &[ExtId]) -> SyncResult<()> {
    if ext_ids.is_empty() {
        return Err(SyncError::Validation(
            "single or multiple 'extIds' are required".into(),
        ));
    }
    Ok(())
}
