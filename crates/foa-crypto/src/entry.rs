//! The ledger's entry wire format and the objects handed to the network.
//!
//! Layout of a marshalled entry:
//!
//! ```text
//! 0x00 | chain id (32) | ext-id section len (u16 BE) | { len (u16 BE) | ext id }* | content
//! ```

use foa_types::{ChainId, Content, EntryHash, ExtId};
use serde::{Deserialize, Serialize};

use crate::hasher::{chain_id, ledger_hash};

/// Largest marshalled entry the ledger accepts, header included.
pub const MAX_ENTRY_SIZE: usize = 10240;

/// Version byte, chain id, and ext-id section length.
pub const ENTRY_HEADER_SIZE: usize = 1 + 32 + 2;

const ENTRY_VERSION: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("entry is {size} bytes, the ledger accepts at most {max}")]
    TooLarge { size: usize, max: usize },

    #[error("a chain requires at least one external id")]
    MissingExtIds,
}

/// Marshalled size of an entry, header included.
pub fn entry_size(ext_ids: &[ExtId], content: &Content) -> usize {
    ENTRY_HEADER_SIZE + ext_id_section_len(ext_ids) + content.len()
}

fn ext_id_section_len(ext_ids: &[ExtId]) -> usize {
    ext_ids.iter().map(|e| 2 + e.len()).sum()
}

/// Marshal an entry, enforcing [`MAX_ENTRY_SIZE`].
///
/// Every length field fits in a `u16` once the ceiling holds.
pub fn marshal_entry(
    chain_id: &ChainId,
    ext_ids: &[ExtId],
    content: &Content,
) -> Result<Vec<u8>, EntryError> {
    let size = entry_size(ext_ids, content);
    if size > MAX_ENTRY_SIZE {
        return Err(EntryError::TooLarge {
            size,
            max: MAX_ENTRY_SIZE,
        });
    }

    let mut out = Vec::with_capacity(size);
    out.push(ENTRY_VERSION);
    out.extend_from_slice(chain_id.as_bytes());
    out.extend_from_slice(&(ext_id_section_len(ext_ids) as u16).to_be_bytes());
    for ext in ext_ids {
        out.extend_from_slice(&(ext.len() as u16).to_be_bytes());
        out.extend_from_slice(ext.as_bytes());
    }
    out.extend_from_slice(content.as_bytes());
    Ok(out)
}

/// Hash of an entry as the ledger computes it.
pub fn entry_hash(
    chain_id: &ChainId,
    ext_ids: &[ExtId],
    content: &Content,
) -> Result<EntryHash, EntryError> {
    let marshalled = marshal_entry(chain_id, ext_ids, content)?;
    Ok(EntryHash::from_hash(ledger_hash(&marshalled)))
}

/// An entry ready for submission: validated, hashed, and marshalled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedEntry {
    pub chain_id: ChainId,
    pub entry_hash: EntryHash,
    pub ext_ids: Vec<ExtId>,
    pub content: Content,
    pub marshalled: Vec<u8>,
}

impl ComposedEntry {
    pub fn compose(
        chain_id: ChainId,
        ext_ids: Vec<ExtId>,
        content: Content,
    ) -> Result<Self, EntryError> {
        let marshalled = marshal_entry(&chain_id, &ext_ids, &content)?;
        Ok(Self {
            chain_id,
            entry_hash: EntryHash::from_hash(ledger_hash(&marshalled)),
            ext_ids,
            content,
            marshalled,
        })
    }

    pub fn size(&self) -> usize {
        self.marshalled.len()
    }
}

/// A new chain ready for submission: its id plus its first entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedChain {
    pub chain_id: ChainId,
    pub first_entry: ComposedEntry,
}

impl ComposedChain {
    pub fn compose(ext_ids: Vec<ExtId>, content: Content) -> Result<Self, EntryError> {
        if ext_ids.is_empty() {
            return Err(EntryError::MissingExtIds);
        }
        let chain_id = chain_id(&ext_ids);
        let first_entry = ComposedEntry::compose(chain_id, ext_ids, content)?;
        Ok(Self {
            chain_id,
            first_entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ext(s: &str) -> ExtId {
        ExtId::from(s)
    }

    #[test]
    fn marshal_layout() {
        let cid = ChainId::from_hash([0xaa; 32]);
        let bytes = marshal_entry(&cid, &[ext("ab")], &Content::from("xyz")).unwrap();
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..33], &[0xaa; 32]);
        assert_eq!(&bytes[33..35], &[0, 4]);
        assert_eq!(&bytes[35..37], &[0, 2]);
        assert_eq!(&bytes[37..39], b"ab");
        assert_eq!(&bytes[39..], b"xyz");
        assert_eq!(bytes.len(), entry_size(&[ext("ab")], &Content::from("xyz")));
    }

    #[test]
    fn entry_hash_known_vector() {
        let composed =
            ComposedChain::compose(vec![ext("foa"), ext("test")], Content::from("hello")).unwrap();
        assert_eq!(composed.first_entry.size(), 51);
        assert_eq!(
            composed.first_entry.entry_hash.to_hex(),
            "fb9009ce2d3a62aea2fe32bba21aa710ff0c25b7673d8381be624d0c0834bf79"
        );
    }

    #[test]
    fn exactly_max_size_is_accepted() {
        let cid = ChainId::from_hash([1; 32]);
        let ext_ids = vec![ext("tag")];
        let room = MAX_ENTRY_SIZE - ENTRY_HEADER_SIZE - (2 + 3);
        let content = Content::new(vec![b'x'; room]);
        let composed = ComposedEntry::compose(cid, ext_ids, content).unwrap();
        assert_eq!(composed.size(), MAX_ENTRY_SIZE);
    }

    #[test]
    fn one_byte_over_is_rejected() {
        let cid = ChainId::from_hash([1; 32]);
        let room = MAX_ENTRY_SIZE - ENTRY_HEADER_SIZE + 1;
        let err = ComposedEntry::compose(cid, vec![], Content::new(vec![0; room])).unwrap_err();
        assert_eq!(
            err,
            EntryError::TooLarge {
                size: MAX_ENTRY_SIZE + 1,
                max: MAX_ENTRY_SIZE
            }
        );
    }

    #[test]
    fn chain_requires_ext_ids() {
        assert_eq!(
            ComposedChain::compose(vec![], Content::from("c")).unwrap_err(),
            EntryError::MissingExtIds
        );
    }

    #[test]
    fn entry_hash_binds_chain_id() {
        let a = entry_hash(&ChainId::from_hash([1; 32]), &[], &Content::from("same")).unwrap();
        let b = entry_hash(&ChainId::from_hash([2; 32]), &[], &Content::from("same")).unwrap();
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn composed_chain_is_deterministic(
            ext in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..32), 1..6),
            content in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let ext_ids: Vec<ExtId> = ext.into_iter().map(ExtId::new).collect();
            let content = Content::new(content);
            let a = ComposedChain::compose(ext_ids.clone(), content.clone()).unwrap();
            let b = ComposedChain::compose(ext_ids, content).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
