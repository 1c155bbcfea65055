use foa_types::{
    Chain, ChainFilter, ChainId, Content, Entry, EntryFilter, EntryHash, ExtId, NetworkRef, Page,
    Pagination, SyncStatus, User, UserId,
};

use crate::error::StoreResult;

/// A write waiting for admission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingWrite {
    /// A new chain together with the record of its first entry.
    Chain { chain: Chain, first_entry: Entry },
    Entry(Entry),
}

impl PendingWrite {
    /// Usage units charged for this write.
    pub fn usage_cost(&self) -> u64 {
        match self {
            Self::Chain { .. } => 2,
            Self::Entry(_) => 1,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        match self {
            Self::Chain { chain, .. } => chain.chain_id,
            Self::Entry(entry) => entry.chain_id,
        }
    }
}

/// Outcome of a successful admission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Admission {
    pub write_seq: u64,
    /// The user after the charge.
    pub user: User,
}

/// A write that has been admitted but not yet accepted by the network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueuedWrite {
    Chain(Chain),
    Entry(Entry),
}

impl QueuedWrite {
    pub fn write_seq(&self) -> u64 {
        match self {
            Self::Chain(c) => c.write_seq.unwrap_or(0),
            Self::Entry(e) => e.write_seq.unwrap_or(0),
        }
    }

    pub fn target(&self) -> WriteTarget {
        match self {
            Self::Chain(c) => WriteTarget::Chain(c.chain_id),
            Self::Entry(e) => WriteTarget::Entry(e.entry_hash),
        }
    }
}

/// The object a submission refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteTarget {
    Chain(ChainId),
    Entry(EntryHash),
}

/// An entry confirmed by the network at a known ledger position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MirroredEntry {
    pub entry_hash: EntryHash,
    pub chain_id: ChainId,
    pub ext_ids: Vec<ExtId>,
    pub content: Content,
    pub position: u64,
}

/// Keyed persistence for chains, entries, and user quotas.
///
/// All implementations must satisfy these invariants:
/// - Every mutating method is a single transaction: it applies fully or not
///   at all.
/// - Status never moves backwards (`queued → processing → completed`);
///   a regressing write fails with `StatusRegression`.
/// - Usage is checked and charged in the same transaction as the admitted
///   write, so concurrent admissions cannot overcommit a quota.
/// - Entries of a chain are iterated in ledger order.
pub trait ObjectStore: Send + Sync {
    // -- users --------------------------------------------------------------

    fn insert_user(&self, user: User) -> StoreResult<()>;

    fn user(&self, id: &UserId) -> StoreResult<Option<User>>;

    fn user_by_key(&self, key: &str) -> StoreResult<Option<User>>;

    // -- reads --------------------------------------------------------------

    fn chain(&self, id: &ChainId) -> StoreResult<Option<Chain>>;

    fn entry(&self, hash: &EntryHash) -> StoreResult<Option<Entry>>;

    /// Chains matching `filter`, in creation order, windowed by `page`.
    fn query_chains(&self, filter: &ChainFilter, page: &Pagination) -> StoreResult<Page<Chain>>;

    /// Entries matching `filter`, in ledger order, windowed by `page`.
    fn query_entries(&self, filter: &EntryFilter, page: &Pagination) -> StoreResult<Page<Entry>>;

    /// Entries of `chain` that are still queued or processing.
    fn pending_entries(&self, chain: &ChainId) -> StoreResult<usize>;

    /// Queued writes for `chain`, oldest admission first.
    fn queued_writes(&self, chain: &ChainId) -> StoreResult<Vec<QueuedWrite>>;

    /// Chains that have at least one queued write, oldest first.
    fn chains_with_queued_writes(&self) -> StoreResult<Vec<ChainId>>;

    /// Every chain known to the store with its current status.
    fn tracked_chains(&self) -> StoreResult<Vec<(ChainId, SyncStatus)>>;

    // -- transactions -------------------------------------------------------

    /// Check the quota, charge it, and persist `write` as queued.
    ///
    /// Fails with `Conflict` (no charge) when the object already exists and
    /// with `LimitExceeded` when the quota cannot cover the write.
    fn admit(&self, user: &UserId, write: PendingWrite) -> StoreResult<Admission>;

    /// Persist a chain discovered on the network. If the chain is already
    /// known its owners are merged and the stored record is returned.
    fn insert_chain(&self, chain: Chain) -> StoreResult<Chain>;

    fn add_owner(&self, chain: &ChainId, user: &UserId) -> StoreResult<()>;

    /// Record a successful submission: status becomes at least `processing`.
    ///
    /// `network_ref` is `None` when the network already had the object.
    fn mark_submitted(&self, target: WriteTarget, network_ref: Option<NetworkRef>)
        -> StoreResult<()>;

    /// Drop a write the network refused for good. Usage stays charged.
    ///
    /// Only a still `queued` object is removed; a discarded chain takes its
    /// queued entries with it. Returns whether anything was removed.
    fn discard_write(&self, target: WriteTarget) -> StoreResult<bool>;

    fn set_chain_status(&self, chain: &ChainId, status: SyncStatus) -> StoreResult<Chain>;

    fn set_entry_status(&self, hash: &EntryHash, status: SyncStatus) -> StoreResult<Entry>;

    /// Persist a confirmed entry at its ledger position and advance the
    /// chain's synced height over every contiguous mirrored position.
    ///
    /// Returns the chain's synced height after the write. Mirroring a
    /// position twice is a no-op.
    fn mirror_entry(&self, entry: MirroredEntry) -> StoreResult<u64>;
}
