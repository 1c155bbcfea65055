use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bytes::{Content, ExtId};
use crate::id::{ChainId, EntryHash, NetworkRef};
use crate::status::SyncStatus;
use crate::user::UserId;

/// A chain as mirrored in the local store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    pub chain_id: ChainId,
    pub ext_ids: Vec<ExtId>,
    /// Content of the chain's first entry, when known.
    pub content: Option<Content>,
    pub first_entry_hash: EntryHash,
    pub status: SyncStatus,
    /// Users that created or looked up this chain through the gateway.
    #[serde(skip)]
    pub owners: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
    /// Number of contiguous ledger positions mirrored so far.
    pub synced_height: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_ref: Option<NetworkRef>,
    /// Admission order; `None` for chains discovered on the network.
    #[serde(skip)]
    pub write_seq: Option<u64>,
}

impl Chain {
    /// Total creation order used for chain listings.
    pub fn creation_order(&self) -> (DateTime<Utc>, ChainId) {
        (self.created_at, self.chain_id)
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.owners.contains(user)
    }
}

/// An entry as mirrored in the local store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub entry_hash: EntryHash,
    pub chain_id: ChainId,
    pub ext_ids: Vec<ExtId>,
    pub content: Content,
    pub status: SyncStatus,
    /// Position within the chain in ledger order; set once mirrored.
    pub position: Option<u64>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_ref: Option<NetworkRef>,
    #[serde(skip)]
    pub write_seq: Option<u64>,
}

impl Entry {
    /// Total ledger order within a chain.
    ///
    /// Mirrored entries come first by position; entries still waiting on the
    /// network follow in admission order.
    pub fn ledger_order(&self) -> (bool, u64, u64, EntryHash) {
        (
            self.position.is_none(),
            self.position.unwrap_or(0),
            self.write_seq.unwrap_or(0),
            self.entry_hash,
        )
    }

    pub fn is_mirrored(&self) -> bool {
        self.position.is_some()
    }
}

/// Link advertised next to a chain in API responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

impl Link {
    pub fn first_entry(hash: &EntryHash) -> Self {
        Self {
            rel: "firstEntry".into(),
            href: format!("/entries/{hash}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(position: Option<u64>, write_seq: Option<u64>, seed: u8) -> Entry {
        Entry {
            entry_hash: EntryHash::from_hash([seed; 32]),
            chain_id: ChainId::from_hash([1; 32]),
            ext_ids: vec![],
            content: Content::from("x"),
            status: SyncStatus::Queued,
            position,
            created_at: Utc::now(),
            network_ref: None,
            write_seq,
        }
    }

    #[test]
    fn mirrored_entries_order_before_pending() {
        let mut entries = vec![
            entry(None, Some(3), 1),
            entry(Some(5), None, 2),
            entry(None, Some(1), 3),
            entry(Some(0), Some(9), 4),
        ];
        entries.sort_by_key(Entry::ledger_order);
        let positions: Vec<_> = entries.iter().map(|e| (e.position, e.write_seq)).collect();
        assert_eq!(
            positions,
            vec![(Some(0), Some(9)), (Some(5), None), (None, Some(1)), (None, Some(3))]
        );
    }

    #[test]
    fn chain_serializes_camel_case_without_owners() {
        let mut owners = BTreeSet::new();
        owners.insert(UserId::new());
        let chain = Chain {
            chain_id: ChainId::from_hash([2; 32]),
            ext_ids: vec![ExtId::from("a")],
            content: None,
            first_entry_hash: EntryHash::from_hash([3; 32]),
            status: SyncStatus::Queued,
            owners,
            created_at: Utc::now(),
            synced_height: 0,
            network_ref: None,
            write_seq: Some(1),
        };
        let value = serde_json::to_value(&chain).unwrap();
        assert!(value.get("chainId").is_some());
        assert!(value.get("firstEntryHash").is_some());
        assert!(value.get("owners").is_none());
        assert!(value.get("writeSeq").is_none());
        assert_eq!(value["status"], "queued");
    }

    #[test]
    fn first_entry_link() {
        let link = Link::first_entry(&EntryHash::from_hash([0; 32]));
        assert_eq!(link.rel, "firstEntry");
        assert!(link.href.starts_with("/entries/0000"));
    }
}
