use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use foa_types::{
    contains_all, Chain, ChainFilter, ChainId, Entry, EntryFilter, EntryHash, NetworkRef, Page,
    Pagination, SyncStatus, User, UserId,
};
use tracing::debug;

use crate::error::{ObjectRef, StoreError, StoreResult};
use crate::traits::{
    Admission, MirroredEntry, ObjectStore, PendingWrite, QueuedWrite, WriteTarget,
};

/// In-memory, `HashMap`-based object store.
///
/// Intended for tests, the development server, and embedding. All state sits
/// behind one `RwLock`; every mutating method takes the write lock once, which
/// makes it a transaction.
pub struct InMemoryStore {
    inner: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    users: HashMap<UserId, User>,
    keys: HashMap<String, UserId>,
    chains: HashMap<ChainId, Chain>,
    entries: HashMap<EntryHash, Entry>,
    chain_index: HashMap<ChainId, ChainIndex>,
    next_write_seq: u64,
}

#[derive(Default)]
struct ChainIndex {
    members: BTreeSet<EntryHash>,
    /// Ledger position -> entry hash, for every mirrored position.
    positions: BTreeMap<u64, EntryHash>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreState::default()),
        }
    }

    /// Number of chains stored.
    pub fn chain_count(&self) -> usize {
        self.read().map(|s| s.chains.len()).unwrap_or(0)
    }

    /// Number of entries stored.
    pub fn entry_count(&self) -> usize {
        self.read().map(|s| s.entries.len()).unwrap_or(0)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("chain_count", &self.chain_count())
            .field("entry_count", &self.entry_count())
            .finish()
    }
}

impl StoreState {
    fn insert_entry(&mut self, entry: Entry) {
        self.chain_index
            .entry(entry.chain_id)
            .or_default()
            .members
            .insert(entry.entry_hash);
        self.entries.insert(entry.entry_hash, entry);
    }

    fn charge(&mut self, user_id: &UserId, cost: u64) -> StoreResult<User> {
        let user = self
            .users
            .get_mut(user_id)
            .ok_or(StoreError::UserNotFound(*user_id))?;
        if !user.enabled {
            return Err(StoreError::UserDisabled(*user_id));
        }
        if !user.can_afford(cost) {
            return Err(StoreError::LimitExceeded {
                limit: user.usage_limit,
                usage: user.usage,
                cost,
            });
        }
        user.usage += cost;
        Ok(user.clone())
    }
}

fn advance(object: ObjectRef, current: &mut SyncStatus, next: SyncStatus) -> StoreResult<()> {
    if !current.can_transition_to(next) {
        return Err(StoreError::StatusRegression {
            object,
            from: *current,
            to: next,
        });
    }
    *current = next;
    Ok(())
}

impl ObjectStore for InMemoryStore {
    fn insert_user(&self, user: User) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.keys.contains_key(&user.access_key) {
            return Err(StoreError::DuplicateKey);
        }
        state.keys.insert(user.access_key.clone(), user.id);
        state.users.insert(user.id, user);
        Ok(())
    }

    fn user(&self, id: &UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(id).cloned())
    }

    fn user_by_key(&self, key: &str) -> StoreResult<Option<User>> {
        let state = self.read()?;
        Ok(state
            .keys
            .get(key)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    fn chain(&self, id: &ChainId) -> StoreResult<Option<Chain>> {
        Ok(self.read()?.chains.get(id).cloned())
    }

    fn entry(&self, hash: &EntryHash) -> StoreResult<Option<Entry>> {
        Ok(self.read()?.entries.get(hash).cloned())
    }

    fn query_chains(&self, filter: &ChainFilter, page: &Pagination) -> StoreResult<Page<Chain>> {
        let state = self.read()?;
        let mut matched: Vec<Chain> = state
            .chains
            .values()
            .filter(|c| filter.owner.map_or(true, |owner| c.is_owned_by(&owner)))
            .filter(|c| filter.status.map_or(true, |status| c.status == status))
            .filter(|c| contains_all(&c.ext_ids, &filter.ext_ids))
            .cloned()
            .collect();
        matched.sort_by_key(Chain::creation_order);
        Ok(page.apply(matched))
    }

    fn query_entries(&self, filter: &EntryFilter, page: &Pagination) -> StoreResult<Page<Entry>> {
        let state = self.read()?;
        let Some(index) = state.chain_index.get(&filter.chain_id) else {
            return Ok(Page::empty());
        };
        let mut matched: Vec<Entry> = index
            .members
            .iter()
            .filter_map(|hash| state.entries.get(hash))
            .filter(|e| filter.status.map_or(true, |status| e.status == status))
            .filter(|e| contains_all(&e.ext_ids, &filter.ext_ids))
            .cloned()
            .collect();
        matched.sort_by_key(Entry::ledger_order);
        Ok(page.apply(matched))
    }

    fn pending_entries(&self, chain: &ChainId) -> StoreResult<usize> {
        let state = self.read()?;
        Ok(state
            .chain_index
            .get(chain)
            .map(|index| {
                index
                    .members
                    .iter()
                    .filter_map(|hash| state.entries.get(hash))
                    .filter(|e| e.status.is_pending())
                    .count()
            })
            .unwrap_or(0))
    }

    fn queued_writes(&self, chain: &ChainId) -> StoreResult<Vec<QueuedWrite>> {
        let state = self.read()?;
        let mut writes = Vec::new();
        if let Some(c) = state.chains.get(chain) {
            if c.status == SyncStatus::Queued && c.write_seq.is_some() {
                writes.push(QueuedWrite::Chain(c.clone()));
            }
        }
        if let Some(index) = state.chain_index.get(chain) {
            writes.extend(
                index
                    .members
                    .iter()
                    .filter_map(|hash| state.entries.get(hash))
                    .filter(|e| e.status == SyncStatus::Queued && e.write_seq.is_some())
                    .cloned()
                    .map(QueuedWrite::Entry),
            );
        }
        writes.sort_by_key(QueuedWrite::write_seq);
        Ok(writes)
    }

    fn chains_with_queued_writes(&self) -> StoreResult<Vec<ChainId>> {
        let state = self.read()?;
        let mut oldest: HashMap<ChainId, u64> = HashMap::new();
        let chain_seqs = state
            .chains
            .values()
            .filter(|c| c.status == SyncStatus::Queued)
            .filter_map(|c| c.write_seq.map(|seq| (c.chain_id, seq)));
        let entry_seqs = state
            .entries
            .values()
            .filter(|e| e.status == SyncStatus::Queued)
            .filter_map(|e| e.write_seq.map(|seq| (e.chain_id, seq)));
        for (chain, seq) in chain_seqs.chain(entry_seqs) {
            oldest
                .entry(chain)
                .and_modify(|s| *s = (*s).min(seq))
                .or_insert(seq);
        }
        let mut chains: Vec<(ChainId, u64)> = oldest.into_iter().collect();
        chains.sort_by_key(|(_, seq)| *seq);
        Ok(chains.into_iter().map(|(id, _)| id).collect())
    }

    fn tracked_chains(&self) -> StoreResult<Vec<(ChainId, SyncStatus)>> {
        let state = self.read()?;
        let mut chains: Vec<_> = state
            .chains
            .values()
            .map(|c| (c.chain_id, c.status))
            .collect();
        chains.sort_by_key(|(id, _)| *id);
        Ok(chains)
    }

    fn admit(&self, user: &UserId, write: PendingWrite) -> StoreResult<Admission> {
        let mut state = self.write()?;
        let cost = write.usage_cost();

        match &write {
            PendingWrite::Chain { chain, .. } => {
                if state.chains.contains_key(&chain.chain_id) {
                    return Err(StoreError::Conflict(ObjectRef::Chain(chain.chain_id)));
                }
            }
            PendingWrite::Entry(entry) => {
                if state.entries.contains_key(&entry.entry_hash) {
                    return Err(StoreError::Conflict(ObjectRef::Entry(entry.entry_hash)));
                }
                if !state.chains.contains_key(&entry.chain_id) {
                    return Err(StoreError::ChainNotFound(entry.chain_id));
                }
            }
        }

        // Nothing is mutated before this point, so a rejected charge leaves
        // the store untouched.
        let user = state.charge(user, cost)?;
        state.next_write_seq += 1;
        let write_seq = state.next_write_seq;

        match write {
            PendingWrite::Chain {
                mut chain,
                mut first_entry,
            } => {
                chain.status = SyncStatus::Queued;
                chain.write_seq = Some(write_seq);
                chain.owners.insert(user.id);
                first_entry.status = SyncStatus::Queued;
                first_entry.write_seq = None;
                debug!(chain = %chain.chain_id, write_seq, "chain admitted");
                state.chains.insert(chain.chain_id, chain);
                state.insert_entry(first_entry);
            }
            PendingWrite::Entry(mut entry) => {
                entry.status = SyncStatus::Queued;
                entry.write_seq = Some(write_seq);
                debug!(entry = %entry.entry_hash, write_seq, "entry admitted");
                state.insert_entry(entry);
            }
        }

        Ok(Admission { write_seq, user })
    }

    fn insert_chain(&self, chain: Chain) -> StoreResult<Chain> {
        let mut state = self.write()?;
        if let Some(existing) = state.chains.get_mut(&chain.chain_id) {
            existing.owners.extend(chain.owners);
            return Ok(existing.clone());
        }
        state.chain_index.entry(chain.chain_id).or_default();
        state.chains.insert(chain.chain_id, chain.clone());
        Ok(chain)
    }

    fn add_owner(&self, chain: &ChainId, user: &UserId) -> StoreResult<()> {
        let mut state = self.write()?;
        let record = state
            .chains
            .get_mut(chain)
            .ok_or(StoreError::ChainNotFound(*chain))?;
        record.owners.insert(*user);
        Ok(())
    }

    fn mark_submitted(
        &self,
        target: WriteTarget,
        network_ref: Option<NetworkRef>,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        match target {
            WriteTarget::Chain(id) => {
                let chain = state
                    .chains
                    .get_mut(&id)
                    .ok_or(StoreError::ChainNotFound(id))?;
                chain.status = chain.status.max(SyncStatus::Processing);
                if network_ref.is_some() {
                    chain.network_ref = network_ref.clone();
                }
                let first = chain.first_entry_hash;
                if let Some(entry) = state.entries.get_mut(&first) {
                    entry.status = entry.status.max(SyncStatus::Processing);
                    if network_ref.is_some() {
                        entry.network_ref = network_ref;
                    }
                }
            }
            WriteTarget::Entry(hash) => {
                let entry = state
                    .entries
                    .get_mut(&hash)
                    .ok_or(StoreError::EntryNotFound(hash))?;
                entry.status = entry.status.max(SyncStatus::Processing);
                if network_ref.is_some() {
                    entry.network_ref = network_ref;
                }
            }
        }
        Ok(())
    }

    fn discard_write(&self, target: WriteTarget) -> StoreResult<bool> {
        let mut state = self.write()?;
        match target {
            WriteTarget::Chain(id) => {
                if !state
                    .chains
                    .get(&id)
                    .is_some_and(|c| c.status == SyncStatus::Queued)
                {
                    return Ok(false);
                }
                state.chains.remove(&id);
                if let Some(index) = state.chain_index.remove(&id) {
                    for hash in index.members {
                        if state
                            .entries
                            .get(&hash)
                            .is_some_and(|e| e.status == SyncStatus::Queued)
                        {
                            state.entries.remove(&hash);
                        }
                    }
                }
                debug!(chain = %id, "queued chain discarded");
            }
            WriteTarget::Entry(hash) => {
                let Some(entry) = state.entries.get(&hash) else {
                    return Ok(false);
                };
                if entry.status != SyncStatus::Queued {
                    return Ok(false);
                }
                let chain_id = entry.chain_id;
                state.entries.remove(&hash);
                if let Some(index) = state.chain_index.get_mut(&chain_id) {
                    index.members.remove(&hash);
                }
                debug!(entry = %hash, "queued entry discarded");
            }
        }
        Ok(true)
    }

    fn set_chain_status(&self, chain: &ChainId, status: SyncStatus) -> StoreResult<Chain> {
        let mut state = self.write()?;
        let record = state
            .chains
            .get_mut(chain)
            .ok_or(StoreError::ChainNotFound(*chain))?;
        advance(ObjectRef::Chain(*chain), &mut record.status, status)?;
        Ok(record.clone())
    }

    fn set_entry_status(&self, hash: &EntryHash, status: SyncStatus) -> StoreResult<Entry> {
        let mut state = self.write()?;
        let record = state
            .entries
            .get_mut(hash)
            .ok_or(StoreError::EntryNotFound(*hash))?;
        advance(ObjectRef::Entry(*hash), &mut record.status, status)?;
        Ok(record.clone())
    }

    fn mirror_entry(&self, mirrored: MirroredEntry) -> StoreResult<u64> {
        let mut state = self.write()?;
        let StoreState {
            chains,
            entries,
            chain_index,
            ..
        } = &mut *state;

        let chain = chains
            .get_mut(&mirrored.chain_id)
            .ok_or(StoreError::ChainNotFound(mirrored.chain_id))?;
        let index = chain_index.entry(mirrored.chain_id).or_default();

        if index.positions.contains_key(&mirrored.position) {
            return Ok(chain.synced_height);
        }
        index.positions.insert(mirrored.position, mirrored.entry_hash);
        index.members.insert(mirrored.entry_hash);

        match entries.get_mut(&mirrored.entry_hash) {
            // A hash seen again later in the chain keeps its first position.
            Some(existing) if existing.position.is_some() => {}
            Some(existing) => {
                existing.position = Some(mirrored.position);
                existing.status = SyncStatus::Completed;
            }
            None => {
                entries.insert(
                    mirrored.entry_hash,
                    Entry {
                        entry_hash: mirrored.entry_hash,
                        chain_id: mirrored.chain_id,
                        ext_ids: mirrored.ext_ids,
                        content: mirrored.content,
                        status: SyncStatus::Completed,
                        position: Some(mirrored.position),
                        created_at: Utc::now(),
                        network_ref: None,
                        write_seq: None,
                    },
                );
            }
        }

        while index.positions.contains_key(&chain.synced_height) {
            chain.synced_height += 1;
        }
        Ok(chain.synced_height)
    }
}
