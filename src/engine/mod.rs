//! Storage engine interface
//!
//! Everything the core consumes from the engine's own client library:
//! resolved dictionary metadata, the live transaction, and the executing
//! query cursor. Transport, authentication and schema retrieval live behind
//! these traits.

mod cursor;
mod dictionary;
mod error;
mod transaction;

pub use cursor::{FetchStatus, QueryCursor};
pub use dictionary::{ColumnLayout, IndexKind, IndexRef, Record, TableRef};
pub use error::{EngineError, ErrorClassification};
pub use transaction::{
    AbortOption, ExecType, OperationId, SendPolicy, Transaction, TransactionHandle,
};
