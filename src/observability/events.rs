//! Observable lifecycle events
//!
//! Events are explicit and typed; the logger only ever sees their
//! `as_str()` names.

use std::fmt;

/// Observable events in query and batch processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Client configuration loaded
    ConfigLoaded,

    // Query tree
    /// A level definition was rejected by the builder
    DefinitionRejected,
    /// A root lookup was rewritten into an index scan
    ProjectionRewrittenToScan,
    /// Operation tree finalized
    QueryPrepared,

    // Query execution
    /// Executing cursor instantiated
    QueryCreated,
    /// Cursor could not be instantiated
    QueryCreateFailed,
    /// Result header array doubled
    HeaderArrayGrown,
    /// Fetch loop reached scan-complete
    FetchComplete,
    /// Fetch loop ended on a cursor or allocation error
    FetchFailed,

    // Batches
    /// Batch entries bound to a transaction
    BatchPrepared,
    /// Batch round trip issued
    BatchExecuteStart,
    /// Batch round trip completed
    BatchExecuteComplete,
    /// Transaction reported a failure for the round trip
    BatchExecuteFailed,

    // Transactions
    /// Transaction marked closed after a committing round trip
    TransactionClosed,
}

impl Event {
    /// Returns the event name used in log output
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::DefinitionRejected => "DEFINITION_REJECTED",
            Event::ProjectionRewrittenToScan => "PROJECTION_REWRITTEN_TO_SCAN",
            Event::QueryPrepared => "QUERY_PREPARED",
            Event::QueryCreated => "QUERY_CREATED",
            Event::QueryCreateFailed => "QUERY_CREATE_FAILED",
            Event::HeaderArrayGrown => "HEADER_ARRAY_GROWN",
            Event::FetchComplete => "FETCH_COMPLETE",
            Event::FetchFailed => "FETCH_FAILED",
            Event::BatchPrepared => "BATCH_PREPARED",
            Event::BatchExecuteStart => "BATCH_EXECUTE_START",
            Event::BatchExecuteComplete => "BATCH_EXECUTE_COMPLETE",
            Event::BatchExecuteFailed => "BATCH_EXECUTE_FAILED",
            Event::TransactionClosed => "TRANSACTION_CLOSED",
        }
    }

    /// Returns true for events that report a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::DefinitionRejected
                | Event::QueryCreateFailed
                | Event::FetchFailed
                | Event::BatchExecuteFailed
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
