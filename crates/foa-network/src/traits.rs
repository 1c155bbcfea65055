use async_trait::async_trait;
use foa_crypto::{ComposedChain, ComposedEntry};
use foa_types::{ChainId, EntryHash, NetworkRef};

use crate::error::NetworkResult;
use crate::types::{NetworkChain, NetworkEntry};

/// RPC contract with the ledger network.
///
/// Reads only ever return confirmed data. Submissions are acknowledged with a
/// [`NetworkRef`] long before they are confirmed.
#[async_trait]
pub trait NetworkGateway: Send + Sync {
    /// The confirmed state of a chain, or `None` if the network has no such chain.
    async fn fetch_chain(&self, chain_id: &ChainId) -> NetworkResult<Option<NetworkChain>>;

    async fn fetch_entry(&self, entry_hash: &EntryHash) -> NetworkResult<Option<NetworkEntry>>;

    /// Up to `limit` confirmed entries starting at position `height`,
    /// ascending. Empty once the caller is caught up.
    async fn fetch_entries_since(
        &self,
        chain_id: &ChainId,
        height: u64,
        limit: usize,
    ) -> NetworkResult<Vec<NetworkEntry>>;

    async fn submit_chain(&self, chain: &ComposedChain) -> NetworkResult<NetworkRef>;

    async fn submit_entry(&self, entry: &ComposedEntry) -> NetworkResult<NetworkRef>;
}
