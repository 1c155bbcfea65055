use foa_types::{ChainId, Content, EntryHash, ExtId};
use serde::{Deserialize, Serialize};

/// A chain as confirmed by the network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkChain {
    pub chain_id: ChainId,
    /// Number of confirmed entries, the first entry included.
    pub height: u64,
    /// External ids of the first entry.
    pub ext_ids: Vec<ExtId>,
    /// Content of the first entry.
    pub content: Content,
}

/// A confirmed entry and its position in the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEntry {
    pub entry_hash: EntryHash,
    pub chain_id: ChainId,
    pub ext_ids: Vec<ExtId>,
    pub content: Content,
    /// Zero-based ledger position; the first entry is at 0.
    pub position: u64,
}

/// Snapshot of how often each gateway method was called.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallCounts {
    pub fetch_chain: u64,
    pub fetch_entry: u64,
    pub fetch_entries: u64,
    pub submit_chain: u64,
    pub submit_entry: u64,
}

impl CallCounts {
    pub fn total(&self) -> u64 {
        self.fetch_chain + self.fetch_entry + self.fetch_entries + self.submit_chain + self.submit_entry
    }

    pub fn reads(&self) -> u64 {
        self.fetch_chain + self.fetch_entry + self.fetch_entries
    }
}
