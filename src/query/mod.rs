//! Query execution subsystem
//!
//! Runs a prepared operation tree against an engine cursor and assembles a
//! flat, depth-tagged result set.
//!
//! Results become readable once the executor reaches `Drained`; the
//! borrow on the executor keeps callers from reading mid-fetch.

mod buffer;
mod errors;
mod executor;
mod result;

pub use buffer::{RowBuffer, FLAG_JOIN_TABLE};
pub use errors::{QueryError, QueryErrorCode, QueryResult, Severity};
pub use executor::{QueryExecutor, QueryState};
pub use result::{ResultHeader, ResultStore, DEFAULT_INITIAL_CAPACITY, TAG_NULL};
