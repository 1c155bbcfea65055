use std::fmt;

use foa_crypto::EntryError;
use foa_network::NetworkError;
use foa_store::StoreError;
use foa_types::TypeError;
use serde::{Deserialize, Serialize};

/// Which kind of object a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotFoundKind {
    Chain,
    Entry,
    User,
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Chain => "chain",
            Self::Entry => "entry",
            Self::User => "user",
        })
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("writes limit ({limit} writes) is exceeded: usage {usage}, write costs {cost}")]
    LimitExceeded { limit: u64, usage: u64, cost: u64 },

    #[error("entry is {size} bytes, at most {max} are allowed")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("{0} not found")]
    NotFound(NotFoundKind),

    #[error("sync unavailable: {0}")]
    SyncUnavailable(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl SyncError {
    /// Whether the same request may succeed once the network recovers.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SyncUnavailable(_))
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ChainNotFound(_) => Self::NotFound(NotFoundKind::Chain),
            StoreError::EntryNotFound(_) => Self::NotFound(NotFoundKind::Entry),
            StoreError::UserNotFound(_) => Self::NotFound(NotFoundKind::User),
            StoreError::LimitExceeded { limit, usage, cost } => {
                Self::LimitExceeded { limit, usage, cost }
            }
            StoreError::UserDisabled(id) => Self::Unauthorized(format!("user {id} is disabled")),
            StoreError::Conflict(object) => Self::Conflict(format!("{object} already exists")),
            other => Self::Store(other),
        }
    }
}

impl From<NetworkError> for SyncError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Unavailable(reason) => Self::SyncUnavailable(reason),
            NetworkError::UnknownChain(_) => Self::NotFound(NotFoundKind::Chain),
            NetworkError::AlreadyExists => Self::Conflict("object already exists on the network".into()),
            NetworkError::Rejected(reason) => {
                Self::SyncUnavailable(format!("network rejected the submission: {reason}"))
            }
        }
    }
}

impl From<EntryError> for SyncError {
    fn from(err: EntryError) -> Self {
        match err {
            EntryError::TooLarge { size, max } => Self::PayloadTooLarge { size, max },
            EntryError::MissingExtIds => Self::Validation(err.to_string()),
        }
    }
}

impl From<TypeError> for SyncError {
    fn from(err: TypeError) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
