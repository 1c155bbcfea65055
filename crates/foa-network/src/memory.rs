use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use foa_crypto::{ComposedChain, ComposedEntry};
use foa_types::{ChainId, Content, EntryHash, ExtId, NetworkRef};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{NetworkError, NetworkResult};
use crate::traits::NetworkGateway;
use crate::types::{CallCounts, NetworkChain, NetworkEntry};

/// Simulated ledger network for tests, local demos, and the development server.
///
/// Submissions are acknowledged at once and stay pending until
/// [`confirm_pending`](Self::confirm_pending) appends them, in submission
/// order, the way a block would. The network can be switched offline, slowed
/// down, or told to fail a number of calls, and it counts every call it
/// receives.
pub struct InMemoryNetwork {
    inner: RwLock<NetworkState>,
    offline: AtomicBool,
    failures_left: AtomicU64,
    latency_ms: AtomicU64,
    calls: Counters,
}

#[derive(Default)]
struct NetworkState {
    chains: HashMap<ChainId, ConfirmedChain>,
    entries: HashMap<EntryHash, NetworkEntry>,
    pending: Vec<Submission>,
    next_tx: u64,
}

struct ConfirmedChain {
    ext_ids: Vec<ExtId>,
    content: Content,
    entries: Vec<NetworkEntry>,
}

enum Submission {
    Chain(ComposedChain),
    Entry(ComposedEntry),
}

#[derive(Default)]
struct Counters {
    fetch_chain: AtomicU64,
    fetch_entry: AtomicU64,
    fetch_entries: AtomicU64,
    submit_chain: AtomicU64,
    submit_entry: AtomicU64,
    entries_in_flight: AtomicUsize,
    max_entries_in_flight: AtomicUsize,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(NetworkState::default()),
            offline: AtomicBool::new(false),
            failures_left: AtomicU64::new(0),
            latency_ms: AtomicU64::new(0),
            calls: Counters::default(),
        }
    }

    /// Make every call fail with `Unavailable` while `offline` is set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next `count` calls with `Unavailable`.
    pub fn fail_next(&self, count: u64) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            fetch_chain: self.calls.fetch_chain.load(Ordering::SeqCst),
            fetch_entry: self.calls.fetch_entry.load(Ordering::SeqCst),
            fetch_entries: self.calls.fetch_entries.load(Ordering::SeqCst),
            submit_chain: self.calls.submit_chain.load(Ordering::SeqCst),
            submit_entry: self.calls.submit_entry.load(Ordering::SeqCst),
        }
    }

    /// Largest number of `fetch_entries_since` calls that were ever in flight
    /// at the same time.
    pub fn max_concurrent_entry_fetches(&self) -> usize {
        self.calls.max_entries_in_flight.load(Ordering::SeqCst)
    }

    /// Number of submissions waiting for the next block.
    pub fn pending_count(&self) -> usize {
        self.read().map(|s| s.pending.len()).unwrap_or(0)
    }

    /// Confirm every pending submission in submission order.
    ///
    /// Returns how many submissions were confirmed. Entries whose chain never
    /// got confirmed are dropped.
    pub fn confirm_pending(&self) -> NetworkResult<usize> {
        let mut state = self.write()?;
        let pending = std::mem::take(&mut state.pending);
        let mut confirmed = 0;
        for submission in pending {
            let applied = match submission {
                Submission::Chain(chain) => {
                    let first = chain.first_entry;
                    state.create_chain(first.ext_ids, first.content, first.entry_hash)
                }
                Submission::Entry(entry) => state
                    .append(entry.chain_id, entry.entry_hash, entry.ext_ids, entry.content)
                    .is_some(),
            };
            if applied {
                confirmed += 1;
            }
        }
        if confirmed > 0 {
            debug!(confirmed, "block confirmed");
        }
        Ok(confirmed)
    }

    /// Put a chain directly on the ledger, as another gateway writing to the
    /// same network would. Returns the chain id.
    pub fn seed_chain(&self, ext_ids: Vec<ExtId>, content: Content) -> NetworkResult<ChainId> {
        let composed = ComposedChain::compose(ext_ids, content)
            .map_err(|e| NetworkError::Rejected(e.to_string()))?;
        let mut state = self.write()?;
        let first = composed.first_entry;
        state.create_chain(first.ext_ids, first.content, first.entry_hash);
        Ok(composed.chain_id)
    }

    /// Append a confirmed entry directly, bypassing the pending queue.
    ///
    /// Unlike submissions, an entry already present in the chain is appended
    /// again at a new position.
    pub fn seed_entry(
        &self,
        chain_id: ChainId,
        ext_ids: Vec<ExtId>,
        content: Content,
    ) -> NetworkResult<EntryHash> {
        let composed = ComposedEntry::compose(chain_id, ext_ids, content)
            .map_err(|e| NetworkError::Rejected(e.to_string()))?;
        let mut state = self.write()?;
        state
            .append(chain_id, composed.entry_hash, composed.ext_ids, composed.content)
            .ok_or(NetworkError::UnknownChain(chain_id))?;
        Ok(composed.entry_hash)
    }

    /// Confirm pending submissions every `interval` until `shutdown` flips.
    pub fn spawn_block_producer(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = self.confirm_pending() {
                            warn!(error = %err, "block production failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("block producer stopped");
        })
    }

    async fn simulate_call(&self, counter: &AtomicU64) -> NetworkResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Unavailable("network is offline".into()));
        }
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(NetworkError::Unavailable("injected failure".into()));
        }
        Ok(())
    }

    fn read(&self) -> NetworkResult<RwLockReadGuard<'_, NetworkState>> {
        self.inner
            .read()
            .map_err(|_| NetworkError::Unavailable("network state lock poisoned".into()))
    }

    fn write(&self) -> NetworkResult<RwLockWriteGuard<'_, NetworkState>> {
        self.inner
            .write()
            .map_err(|_| NetworkError::Unavailable("network state lock poisoned".into()))
    }
}

impl Default for InMemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryNetwork")
            .field("pending", &self.pending_count())
            .field("calls", &self.calls())
            .finish()
    }
}

impl NetworkState {
    fn create_chain(&mut self, ext_ids: Vec<ExtId>, content: Content, first: EntryHash) -> bool {
        let chain_id = foa_crypto::chain_id(&ext_ids);
        if self.chains.contains_key(&chain_id) {
            return false;
        }
        self.chains.insert(
            chain_id,
            ConfirmedChain {
                ext_ids: ext_ids.clone(),
                content: content.clone(),
                entries: Vec::new(),
            },
        );
        self.append(chain_id, first, ext_ids, content).is_some()
    }

    fn append(
        &mut self,
        chain_id: ChainId,
        entry_hash: EntryHash,
        ext_ids: Vec<ExtId>,
        content: Content,
    ) -> Option<u64> {
        let chain = self.chains.get_mut(&chain_id)?;
        let entry = NetworkEntry {
            entry_hash,
            chain_id,
            ext_ids,
            content,
            position: chain.entries.len() as u64,
        };
        chain.entries.push(entry.clone());
        let position = entry.position;
        self.entries.entry(entry_hash).or_insert(entry);
        Some(position)
    }

    fn is_pending_chain(&self, chain_id: &ChainId) -> bool {
        self.pending
            .iter()
            .any(|s| matches!(s, Submission::Chain(c) if c.chain_id == *chain_id))
    }

    fn is_pending_entry(&self, entry_hash: &EntryHash) -> bool {
        self.pending.iter().any(|s| match s {
            Submission::Chain(c) => c.first_entry.entry_hash == *entry_hash,
            Submission::Entry(e) => e.entry_hash == *entry_hash,
        })
    }

    fn next_ref(&mut self, hash: &EntryHash) -> NetworkRef {
        self.next_tx += 1;
        NetworkRef::new(format!("tx-{:06}-{}", self.next_tx, hash.short_hex()))
    }
}

struct InFlight<'a>(&'a Counters);

impl<'a> InFlight<'a> {
    fn enter(counters: &'a Counters) -> Self {
        let now = counters.entries_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters
            .max_entries_in_flight
            .fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.entries_in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl NetworkGateway for InMemoryNetwork {
    async fn fetch_chain(&self, chain_id: &ChainId) -> NetworkResult<Option<NetworkChain>> {
        self.simulate_call(&self.calls.fetch_chain).await?;
        let state = self.read()?;
        Ok(state.chains.get(chain_id).map(|c| NetworkChain {
            chain_id: *chain_id,
            height: c.entries.len() as u64,
            ext_ids: c.ext_ids.clone(),
            content: c.content.clone(),
        }))
    }

    async fn fetch_entry(&self, entry_hash: &EntryHash) -> NetworkResult<Option<NetworkEntry>> {
        self.simulate_call(&self.calls.fetch_entry).await?;
        Ok(self.read()?.entries.get(entry_hash).cloned())
    }

    async fn fetch_entries_since(
        &self,
        chain_id: &ChainId,
        height: u64,
        limit: usize,
    ) -> NetworkResult<Vec<NetworkEntry>> {
        let _in_flight = InFlight::enter(&self.calls);
        self.simulate_call(&self.calls.fetch_entries).await?;
        let state = self.read()?;
        let chain = state
            .chains
            .get(chain_id)
            .ok_or(NetworkError::UnknownChain(*chain_id))?;
        Ok(chain
            .entries
            .iter()
            .skip(height as usize)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn submit_chain(&self, chain: &ComposedChain) -> NetworkResult<NetworkRef> {
        self.simulate_call(&self.calls.submit_chain).await?;
        let mut state = self.write()?;
        if state.chains.contains_key(&chain.chain_id) || state.is_pending_chain(&chain.chain_id) {
            return Err(NetworkError::AlreadyExists);
        }
        let network_ref = state.next_ref(&chain.first_entry.entry_hash);
        state.pending.push(Submission::Chain(chain.clone()));
        debug!(chain = %chain.chain_id, %network_ref, "chain submitted");
        Ok(network_ref)
    }

    async fn submit_entry(&self, entry: &ComposedEntry) -> NetworkResult<NetworkRef> {
        self.simulate_call(&self.calls.submit_entry).await?;
        let mut state = self.write()?;
        if !state.chains.contains_key(&entry.chain_id) && !state.is_pending_chain(&entry.chain_id) {
            return Err(NetworkError::UnknownChain(entry.chain_id));
        }
        if state.entries.contains_key(&entry.entry_hash) || state.is_pending_entry(&entry.entry_hash)
        {
            return Err(NetworkError::AlreadyExists);
        }
        let network_ref = state.next_ref(&entry.entry_hash);
        state.pending.push(Submission::Entry(entry.clone()));
        debug!(entry = %entry.entry_hash, %network_ref, "entry submitted");
        Ok(network_ref)
    }
}
