//! Object store for the FOA gateway.
//!
//! Holds the local mirror of chains and entries together with the users
//! whose write quotas gate admission.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryStore`] -- `HashMap`-based store for tests, development, and embedding
//!
//! # Rules
//!
//! 1. Every mutating call is one transaction.
//! 2. A status only ever moves forward: `queued`, `processing`, `completed`.
//! 3. Quota check, charge, and the queued write commit together.
//! 4. An existing object is never overwritten by an admission; the caller
//!    gets `Conflict` and no usage is charged.
//! 5. A chain's synced height counts the contiguous prefix of mirrored
//!    ledger positions.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{ObjectRef, StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use traits::{Admission, MirroredEntry, ObjectStore, PendingWrite, QueuedWrite, WriteTarget};
