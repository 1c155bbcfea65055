//! Ledger network gateway for FOA.
//!
//! [`NetworkGateway`] is the narrow RPC contract the sync engine needs from
//! the ledger: read confirmed chains and entries, page through a chain's
//! entries in ledger order, and submit new chains and entries.
//!
//! [`InMemoryNetwork`] simulates a ledger with block-style confirmation. It
//! backs the test suites and the development server.

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{NetworkError, NetworkResult};
pub use memory::InMemoryNetwork;
pub use traits::NetworkGateway;
pub use types::{CallCounts, NetworkChain, NetworkEntry};
