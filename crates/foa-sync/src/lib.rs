//! # foa-sync
//!
//! The synchronization engine that keeps the local mirror consistent with
//! the ledger network.
//!
//! - [`WriteAdmission`] validates writes, charges the caller's quota, and
//!   submits to the network in per-chain admission order.
//! - [`IngestionWorker`] mirrors confirmed entries, at most one pass per chain.
//! - [`StatusTracker`] computes `queued`/`processing`/`completed` lazily.
//! - [`QueryFacade`] serves reads with a strict "still syncing" answer for
//!   chains that are not complete.
//! - [`SyncEngine`] wires them together and owns the background loops.
//!
//! Every network call is bounded by [`SyncConfig::network_timeout`]; a call
//! that times out is treated like an unreachable network.

pub mod admission;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod locks;
pub mod query;
pub mod retry;
pub mod status;

#[cfg(test)]
mod test_support;

pub use admission::{Admitted, WriteAdmission};
pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use error::{NotFoundKind, SyncError, SyncResult};
pub use ingest::{IngestHandle, IngestionWorker, PassReport};
pub use locks::KeyedLocks;
pub use query::{QueryFacade, ReadOutcome};
pub use retry::RetryPolicy;
pub use status::StatusTracker;
