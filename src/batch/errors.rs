//! Batch error types
//!
//! Per-entry failures are not errors here: they are reported as
//! [`super::EntryOutcome`]s. These variants cover misuse of the coordinator
//! and failures to reach the transaction at all.

use thiserror::Error;

use crate::engine::EngineError;

/// Result type for batch operations
pub type BatchResult<T> = Result<T, BatchError>;

#[derive(Debug, Clone, Error)]
pub enum BatchError {
    #[error("batch is {state}; {call} requires {required}")]
    IllegalState {
        call: &'static str,
        state: &'static str,
        required: &'static str,
    },

    #[error("entry {index} out of range for batch of {len}")]
    EntryOutOfRange { index: usize, len: usize },

    #[error("transaction unavailable: {0}")]
    Transaction(#[from] EngineError),

    #[error("round trip task failed: {0}")]
    TaskFailed(String),
}

impl BatchError {
    /// Numeric code in the client error range
    pub fn code(&self) -> i32 {
        match self {
            BatchError::IllegalState { .. } => 4850,
            BatchError::EntryOutOfRange { .. } => 4851,
            BatchError::Transaction(err) => err.code,
            BatchError::TaskFailed(_) => 4852,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let err = BatchError::EntryOutOfRange { index: 3, len: 2 };
        assert_eq!(err.code(), 4851);
        assert_eq!(err.to_string(), "entry 3 out of range for batch of 2");

        let err: BatchError = EngineError::internal("poisoned").into();
        assert_eq!(err.code(), 4000);
    }
}
