//! Shared wiring for the sync tests: an in-memory store and network with
//! every component built on top of them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use foa_network::{InMemoryNetwork, NetworkGateway};
use foa_store::{InMemoryStore, ObjectStore};
use foa_types::{Chain, ChainId, Content, ExtId, User};

use crate::admission::WriteAdmission;
use crate::config::SyncConfig;
use crate::ingest::IngestionWorker;
use crate::query::QueryFacade;
use crate::retry::RetryPolicy;
use crate::status::{chain_from_network, StatusTracker};

pub fn ext(s: &str) -> ExtId {
    ExtId::from(s)
}

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub network: Arc<InMemoryNetwork>,
    pub config: SyncConfig,
    pub ingest: Arc<IngestionWorker>,
    pub tracker: Arc<StatusTracker>,
    pub admission: Arc<WriteAdmission>,
    pub query: Arc<QueryFacade>,
    next_user: AtomicU64,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_page_size(100)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        let config = SyncConfig {
            network_timeout: Duration::from_millis(200),
            ingest_page_size: page_size,
            retry: RetryPolicy {
                attempts: 3,
                base: Duration::from_millis(1),
                max: Duration::from_millis(4),
            },
            ..SyncConfig::default()
        };
        let store = Arc::new(InMemoryStore::new());
        let network = Arc::new(InMemoryNetwork::new());
        let dyn_store: Arc<dyn ObjectStore> = store.clone();
        let dyn_network: Arc<dyn NetworkGateway> = network.clone();

        let ingest = Arc::new(IngestionWorker::new(
            Arc::clone(&dyn_store),
            Arc::clone(&dyn_network),
            config.clone(),
        ));
        let tracker = Arc::new(StatusTracker::new(
            Arc::clone(&dyn_store),
            Arc::clone(&dyn_network),
            Arc::clone(&ingest),
            config.clone(),
        ));
        let admission = Arc::new(WriteAdmission::new(
            Arc::clone(&dyn_store),
            Arc::clone(&dyn_network),
            Arc::clone(&tracker),
            config.clone(),
        ));
        let query = Arc::new(QueryFacade::new(
            dyn_store,
            dyn_network,
            Arc::clone(&tracker),
            config.clone(),
        ));

        Self {
            store,
            network,
            config,
            ingest,
            tracker,
            admission,
            query,
            next_user: AtomicU64::new(0),
        }
    }

    /// Put a chain on the network with `extra` entries after the first one.
    pub fn seed_chain(&self, tag: &str, extra: usize) -> ChainId {
        let chain_id = self
            .network
            .seed_chain(vec![ext("chain"), ext(tag)], Content::from(tag))
            .unwrap();
        for i in 0..extra {
            self.network
                .seed_entry(
                    chain_id,
                    vec![ext(tag), ext(&format!("e{i}"))],
                    Content::from(format!("entry {i}").as_str()),
                )
                .unwrap();
        }
        chain_id
    }

    /// Record a network chain locally without starting ingestion.
    pub async fn discover(&self, chain_id: ChainId) {
        let remote = self.network.fetch_chain(&chain_id).await.unwrap().unwrap();
        self.store
            .insert_chain(chain_from_network(remote, None).unwrap())
            .unwrap();
    }

    pub fn store_chain(&self, chain_id: ChainId) -> Chain {
        self.store.chain(&chain_id).unwrap().unwrap()
    }

    pub fn user(&self, limit: u64) -> User {
        let n = self.next_user.fetch_add(1, Ordering::SeqCst);
        let user = User::new(format!("user-{n}"), format!("key-{n}"), limit);
        self.store.insert_user(user.clone()).unwrap();
        user
    }

    pub fn usage(&self, user: &User) -> u64 {
        self.store.user(&user.id).unwrap().unwrap().usage
    }
}
