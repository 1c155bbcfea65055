use foa_types::ChainId;

/// Errors reported by a ledger network gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// The network could not be reached or did not answer in time.
    #[error("network unavailable: {0}")]
    Unavailable(String),

    /// The submitted chain or entry is already on the network.
    #[error("object already exists on the network")]
    AlreadyExists,

    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("chain not found on the network: {0}")]
    UnknownChain(ChainId),
}

impl NetworkError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub type NetworkResult<T> = Result<T, NetworkError>;
