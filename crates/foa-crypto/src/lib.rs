//! Identifier derivation for the FOA gateway.
//!
//! Chain ids and entry hashes are computed exactly as the ledger network
//! computes them, so an object's identifier is known before it is submitted
//! and matches what the network later reports.
//!
//! All hashing wraps the `sha2` crate; there is no custom cryptography.

pub mod entry;
pub mod hasher;

pub use entry::{
    entry_hash, entry_size, marshal_entry, ComposedChain, ComposedEntry, EntryError,
    ENTRY_HEADER_SIZE, MAX_ENTRY_SIZE,
};
pub use hasher::{chain_id, ledger_hash, sha256};
