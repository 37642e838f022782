//! Batched key operations
//!
//! A [`BatchCoordinator`] owns a fixed array of independent primary-key
//! operations, defines them on a transaction and runs them as one round
//! trip. Every entry ends with exactly one [`EntryOutcome`]:
//!
//! - its own operation error, if it has one
//! - otherwise the transaction's error, if the round trip failed
//! - otherwise success

mod blob;
mod coordinator;
mod entry;
mod errors;

pub use blob::BlobHandler;
pub use coordinator::{BatchCoordinator, BatchState, ExecutionReport};
pub use entry::{BatchEntry, EntryOutcome, ErrorSlot, KeyOpcode, KeyOperation};
pub use errors::{BatchError, BatchResult};
