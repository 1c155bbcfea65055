//! Foundation types for the FOA gateway.
//!
//! Every other FOA crate depends on `foa-types`. It defines the records the
//! gateway mirrors from the ledger network and the parameters used to query
//! them.
//!
//! # Key Types
//!
//! - [`ChainId`] / [`EntryHash`] -- 32-byte identifiers, hex on the wire
//! - [`ExtId`] / [`Content`] -- opaque byte payloads, base64 on the wire
//! - [`SyncStatus`] -- the monotonic `queued → processing → completed` machine
//! - [`Chain`] / [`Entry`] -- mirrored records
//! - [`User`] -- API user with a write quota
//! - [`Pagination`], [`ChainFilter`], [`EntryFilter`] -- query parameters

pub mod bytes;
pub mod error;
pub mod id;
pub mod query;
pub mod record;
pub mod status;
pub mod user;

pub use bytes::{contains_all, Content, ExtId};
pub use error::TypeError;
pub use id::{ChainId, EntryHash, NetworkRef};
pub use query::{parse_status_filter, ChainFilter, EntryFilter, Page, Pagination, SortOrder};
pub use record::{Chain, Entry, Link};
pub use status::SyncStatus;
pub use user::{User, UserId};
