use std::sync::Arc;

use foa_network::NetworkGateway;
use foa_store::ObjectStore;
use foa_types::SyncStatus;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::admission::WriteAdmission;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::ingest::IngestionWorker;
use crate::query::QueryFacade;
use crate::status::StatusTracker;

/// All sync components wired over one store and one network gateway.
pub struct SyncEngine {
    store: Arc<dyn ObjectStore>,
    config: SyncConfig,
    ingest: Arc<IngestionWorker>,
    tracker: Arc<StatusTracker>,
    admission: Arc<WriteAdmission>,
    query: Arc<QueryFacade>,
    shutdown: watch::Sender<bool>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        network: Arc<dyn NetworkGateway>,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        config.validate()?;
        let ingest = Arc::new(IngestionWorker::new(
            Arc::clone(&store),
            Arc::clone(&network),
            config.clone(),
        ));
        let tracker = Arc::new(StatusTracker::new(
            Arc::clone(&store),
            Arc::clone(&network),
            Arc::clone(&ingest),
            config.clone(),
        ));
        let admission = Arc::new(WriteAdmission::new(
            Arc::clone(&store),
            Arc::clone(&network),
            Arc::clone(&tracker),
            config.clone(),
        ));
        let query = Arc::new(QueryFacade::new(
            Arc::clone(&store),
            network,
            Arc::clone(&tracker),
            config.clone(),
        ));
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            store,
            config,
            ingest,
            tracker,
            admission,
            query,
            shutdown,
        })
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn ingest(&self) -> &Arc<IngestionWorker> {
        &self.ingest
    }

    pub fn tracker(&self) -> &Arc<StatusTracker> {
        &self.tracker
    }

    pub fn admission(&self) -> &Arc<WriteAdmission> {
        &self.admission
    }

    pub fn query(&self) -> &Arc<QueryFacade> {
        &self.query
    }

    /// Trigger ingestion for every tracked chain the network already knows.
    ///
    /// Returns the number of chains triggered.
    pub fn refresh(&self) -> SyncResult<usize> {
        trigger_tracked(self.store.as_ref(), &self.ingest)
    }

    /// Start the queue and refresh loops. Both stop on [`SyncEngine::shutdown`].
    pub fn spawn_background(&self) -> Vec<JoinHandle<()>> {
        vec![self.spawn_queue_loop(), self.spawn_refresh_loop()]
    }

    /// Signal the background loops to stop.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Receiver that flips to `true` when the engine shuts down.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    fn spawn_queue_loop(&self) -> JoinHandle<()> {
        let admission = Arc::clone(&self.admission);
        let interval = self.config.queue_interval;
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match admission.flush_all().await {
                            Ok(0) => {}
                            Ok(submitted) => debug!(submitted, "queued writes submitted"),
                            Err(err) => warn!(error = %err, "queue flush failed"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("queue loop stopped");
        })
    }

    fn spawn_refresh_loop(&self) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let ingest = Arc::clone(&self.ingest);
        let interval = self.config.refresh_interval;
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Skip the immediate tick; chains are ingested on demand at startup.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match trigger_tracked(store.as_ref(), &ingest) {
                            Ok(triggered) => debug!(triggered, "refresh triggered"),
                            Err(err) => warn!(error = %err, "refresh failed"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("refresh loop stopped");
        })
    }
}

fn trigger_tracked(store: &dyn ObjectStore, ingest: &Arc<IngestionWorker>) -> SyncResult<usize> {
    let mut triggered = 0;
    for (chain_id, status) in store.tracked_chains()? {
        if status == SyncStatus::Queued {
            continue;
        }
        let _ = ingest.trigger(chain_id);
        triggered += 1;
    }
    Ok(triggered)
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}
