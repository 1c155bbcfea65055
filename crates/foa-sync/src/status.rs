use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use foa_network::{NetworkChain, NetworkGateway};
use foa_store::ObjectStore;
use foa_types::{Chain, ChainId, EntryHash, SyncStatus, UserId};
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::error::{NotFoundKind, SyncError, SyncResult};
use crate::ingest::IngestionWorker;
use crate::retry::timed;

/// Computes and persists the confirmation status of chains and entries.
///
/// `completed` is terminal: once stored, status checks answer from the store
/// without touching the network.
pub struct StatusTracker {
    store: Arc<dyn ObjectStore>,
    network: Arc<dyn NetworkGateway>,
    ingest: Arc<IngestionWorker>,
    config: SyncConfig,
}

impl StatusTracker {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        network: Arc<dyn NetworkGateway>,
        ingest: Arc<IngestionWorker>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            network,
            ingest,
            config,
        }
    }

    pub async fn chain_status(&self, chain_id: &ChainId) -> SyncResult<SyncStatus> {
        let chain = self
            .store
            .chain(chain_id)?
            .ok_or(SyncError::NotFound(NotFoundKind::Chain))?;
        if chain.status.is_completed() {
            return Ok(SyncStatus::Completed);
        }

        let remote = timed(self.config.network_timeout, self.network.fetch_chain(chain_id)).await?;
        let Some(remote) = remote else {
            debug!(chain = %chain_id, status = %chain.status, "chain not confirmed yet");
            return Ok(chain.status);
        };

        if chain.synced_height < remote.height {
            if chain.status == SyncStatus::Queued {
                self.store.set_chain_status(chain_id, SyncStatus::Processing)?;
                info!(chain = %chain_id, "chain processing");
            }
            let _ = self.ingest.trigger(*chain_id);
            return Ok(SyncStatus::Processing);
        }

        settle_chain(self.store.as_ref(), chain_id, remote.height)
    }

    pub async fn entry_status(&self, entry_hash: &EntryHash) -> SyncResult<SyncStatus> {
        let entry = self
            .store
            .entry(entry_hash)?
            .ok_or(SyncError::NotFound(NotFoundKind::Entry))?;
        if entry.status.is_completed() {
            return Ok(SyncStatus::Completed);
        }

        let remote =
            timed(self.config.network_timeout, self.network.fetch_entry(entry_hash)).await?;
        if remote.is_none() {
            return Ok(entry.status);
        }

        // Confirmed on the network, not mirrored yet.
        if entry.status == SyncStatus::Queued {
            self.store.set_entry_status(entry_hash, SyncStatus::Processing)?;
        }
        let _ = self.ingest.trigger(entry.chain_id);
        Ok(SyncStatus::Processing)
    }

    /// Look a chain up on the network and start mirroring it.
    ///
    /// Returns `None` if the network does not know the chain either.
    pub async fn discover_chain(
        &self,
        chain_id: &ChainId,
        owner: Option<UserId>,
    ) -> SyncResult<Option<Chain>> {
        let remote = timed(self.config.network_timeout, self.network.fetch_chain(chain_id)).await?;
        let Some(remote) = remote else {
            return Ok(None);
        };
        let height = remote.height;
        let chain = self.store.insert_chain(chain_from_network(remote, owner)?)?;
        info!(chain = %chain_id, height, "chain discovered on the network");
        let _ = self.ingest.trigger(*chain_id);
        Ok(Some(chain))
    }
}

/// Build the local record for a chain first seen on the network.
pub(crate) fn chain_from_network(remote: NetworkChain, owner: Option<UserId>) -> SyncResult<Chain> {
    let first_entry_hash = foa_crypto::entry_hash(&remote.chain_id, &remote.ext_ids, &remote.content)?;
    Ok(Chain {
        chain_id: remote.chain_id,
        ext_ids: remote.ext_ids,
        content: Some(remote.content),
        first_entry_hash,
        status: SyncStatus::Processing,
        owners: owner.into_iter().collect::<BTreeSet<_>>(),
        created_at: Utc::now(),
        synced_height: 0,
        network_ref: None,
        write_seq: None,
    })
}

/// Settle a chain's status once the mirror has reached `network_height`.
///
/// The chain completes when nothing confirmed is left to mirror and none of
/// its entries is still waiting on the network.
pub(crate) fn settle_chain(
    store: &dyn ObjectStore,
    chain_id: &ChainId,
    network_height: u64,
) -> SyncResult<SyncStatus> {
    let chain = store
        .chain(chain_id)?
        .ok_or(SyncError::NotFound(NotFoundKind::Chain))?;
    if chain.status.is_completed() {
        return Ok(SyncStatus::Completed);
    }
    if network_height == 0 {
        return Ok(chain.status);
    }
    if chain.synced_height >= network_height && store.pending_entries(chain_id)? == 0 {
        store.set_chain_status(chain_id, SyncStatus::Completed)?;
        info!(chain = %chain_id, height = chain.synced_height, "chain completed");
        return Ok(SyncStatus::Completed);
    }
    if chain.status == SyncStatus::Queued {
        store.set_chain_status(chain_id, SyncStatus::Processing)?;
        info!(chain = %chain_id, "chain processing");
    }
    Ok(SyncStatus::Processing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ext, Fixture};
    use foa_types::Content;

    #[tokio::test]
    async fn completed_chain_makes_no_network_calls() {
        let fx = Fixture::new();
        let chain_id = fx.seed_chain("done", 2);
        fx.discover(chain_id).await;
        fx.ingest.trigger(chain_id).wait().await.unwrap();
        assert_eq!(fx.store_chain(chain_id).status, SyncStatus::Completed);

        let before = fx.network.calls();
        for _ in 0..3 {
            assert_eq!(
                fx.tracker.chain_status(&chain_id).await.unwrap(),
                SyncStatus::Completed
            );
        }
        assert_eq!(fx.network.calls(), before);
    }

    #[tokio::test]
    async fn unconfirmed_chain_keeps_stored_status() {
        let fx = Fixture::new();
        let user = fx.user(0);
        let admitted = fx
            .admission
            .admit_chain(&user, vec![ext("pending")], Content::from("c"))
            .await
            .unwrap();
        let chain_id = admitted.record.chain_id;
        assert_eq!(
            fx.tracker.chain_status(&chain_id).await.unwrap(),
            SyncStatus::Processing
        );

        fx.network.set_offline(true);
        let err = fx.tracker.chain_status(&chain_id).await.unwrap_err();
        assert!(matches!(err, SyncError::SyncUnavailable(_)));
        assert_eq!(fx.store_chain(chain_id).status, SyncStatus::Processing);
    }

    #[tokio::test]
    async fn confirmation_drives_chain_to_completed() {
        let fx = Fixture::new();
        let user = fx.user(0);
        let admitted = fx
            .admission
            .admit_chain(&user, vec![ext("flow")], Content::from("c"))
            .await
            .unwrap();
        let chain_id = admitted.record.chain_id;
        fx.network.confirm_pending().unwrap();

        assert_eq!(
            fx.tracker.chain_status(&chain_id).await.unwrap(),
            SyncStatus::Processing
        );
        fx.ingest.trigger(chain_id).wait().await.unwrap();
        assert_eq!(
            fx.tracker.chain_status(&chain_id).await.unwrap(),
            SyncStatus::Completed
        );
        let first = fx
            .store
            .entry(&admitted.record.first_entry_hash)
            .unwrap()
            .unwrap();
        assert_eq!(first.status, SyncStatus::Completed);
        assert_eq!(first.position, Some(0));
    }

    #[tokio::test]
    async fn pending_entry_blocks_completion() {
        let fx = Fixture::new();
        let user = fx.user(0);
        let chain_id = fx
            .admission
            .admit_chain(&user, vec![ext("blocked")], Content::from("c"))
            .await
            .unwrap()
            .record
            .chain_id;

        fx.network.set_offline(true);
        fx.admission
            .admit_entry(&user, chain_id, vec![ext("e")], Content::from("x"))
            .await
            .unwrap();
        fx.network.set_offline(false);
        fx.network.confirm_pending().unwrap();

        let report = fx.ingest.trigger(chain_id).wait().await.unwrap();
        assert_eq!(report.synced_height, 1);
        assert_eq!(report.status, SyncStatus::Processing);
        assert_eq!(fx.store.pending_entries(&chain_id).unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_chain_is_not_found() {
        let fx = Fixture::new();
        let err = fx
            .tracker
            .chain_status(&ChainId::from_hash([3; 32]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(NotFoundKind::Chain)));
    }

    #[tokio::test]
    async fn confirmed_entry_is_processing_until_mirrored() {
        let fx = Fixture::new();
        let user = fx.user(0);
        let chain_id = fx.seed_chain("entries", 0);
        fx.discover(chain_id).await;
        fx.ingest.trigger(chain_id).wait().await.unwrap();

        let admitted = fx
            .admission
            .admit_entry(&user, chain_id, vec![ext("e")], Content::from("x"))
            .await
            .unwrap();
        let hash = admitted.record.entry_hash;
        assert_eq!(
            fx.tracker.entry_status(&hash).await.unwrap(),
            SyncStatus::Processing
        );

        fx.network.confirm_pending().unwrap();
        assert_eq!(
            fx.tracker.entry_status(&hash).await.unwrap(),
            SyncStatus::Processing
        );
        fx.ingest.trigger(chain_id).wait().await.unwrap();
        assert_eq!(
            fx.tracker.entry_status(&hash).await.unwrap(),
            SyncStatus::Completed
        );
    }

    #[tokio::test]
    async fn slow_network_times_out_as_unavailable() {
        let fx = Fixture::new();
        let chain_id = fx.seed_chain("slow", 0);
        fx.discover(chain_id).await;
        fx.network
            .set_latency(fx.config.network_timeout + std::time::Duration::from_millis(50));
        let err = fx.tracker.chain_status(&chain_id).await.unwrap_err();
        assert!(matches!(err, SyncError::SyncUnavailable(_)));
    }
}
