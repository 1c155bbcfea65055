use foa_types::{ChainId, EntryHash, SyncStatus, UserId};

/// The object a conflicting write collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRef {
    Chain(ChainId),
    Entry(EntryHash),
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chain(id) => write!(f, "chain {id}"),
            Self::Entry(hash) => write!(f, "entry {hash}"),
        }
    }
}

/// Errors from object store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("chain not found: {0}")]
    ChainNotFound(ChainId),

    #[error("entry not found: {0}")]
    EntryNotFound(EntryHash),

    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// The object already exists; the write was not applied.
    #[error("{0} already exists")]
    Conflict(ObjectRef),

    /// The write would move a status backwards.
    #[error("status of {object} cannot move from {from} to {to}")]
    StatusRegression {
        object: ObjectRef,
        from: SyncStatus,
        to: SyncStatus,
    },

    #[error("usage limit of {limit} exceeded: usage {usage}, write costs {cost}")]
    LimitExceeded { limit: u64, usage: u64, cost: u64 },

    #[error("user {0} is disabled")]
    UserDisabled(UserId),

    #[error("access key already assigned to another user")]
    DuplicateKey,

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    Poisoned(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
