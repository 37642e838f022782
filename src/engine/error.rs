//! Storage engine error object
//!
//! Mirrors the engine's native error: a numeric code (0 = no error), a
//! classification and a message.

use std::fmt;

use thiserror::Error;

/// Engine error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    /// Error raised by the application request itself
    Application,
    /// Requested row does not exist
    NoDataFound,
    /// Unique or foreign key constraint violated
    ConstraintViolation,
    /// Table, index or column mismatch
    Schema,
    /// Temporary resource shortage, retry may succeed
    TemporaryResource,
    /// Transaction or round trip timed out
    Timeout,
    /// Internal engine failure
    Internal,
    /// Outcome of the request is unknown
    Unknown,
}

impl ErrorClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClassification::Application => "application error",
            ErrorClassification::NoDataFound => "no data found",
            ErrorClassification::ConstraintViolation => "constraint violation",
            ErrorClassification::Schema => "schema error",
            ErrorClassification::TemporaryResource => "temporary resource error",
            ErrorClassification::Timeout => "timeout expired",
            ErrorClassification::Internal => "internal error",
            ErrorClassification::Unknown => "unknown result",
        }
    }
}

impl fmt::Display for ErrorClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error reported by the storage engine for a transaction, operation or cursor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("engine error {code} ({classification}): {message}")]
pub struct EngineError {
    /// Engine error code; 0 means no error
    pub code: i32,
    /// Error classification
    pub classification: ErrorClassification,
    /// Human-readable message
    pub message: String,
}

impl EngineError {
    pub fn new(
        code: i32,
        classification: ErrorClassification,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            classification,
            message: message.into(),
        }
    }

    /// Row not found (code 626)
    pub fn no_data_found() -> Self {
        Self::new(626, ErrorClassification::NoDataFound, "Tuple did not exist")
    }

    /// Duplicate primary key (code 630)
    pub fn duplicate_key() -> Self {
        Self::new(
            630,
            ErrorClassification::ConstraintViolation,
            "Tuple already existed when attempting to insert",
        )
    }

    /// Internal failure on the client side of the engine interface
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(4000, ErrorClassification::Internal, message)
    }

    /// Returns true when the code signals success
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// Returns true when a retry by the caller may succeed
    pub fn is_temporary(&self) -> bool {
        matches!(
            self.classification,
            ErrorClassification::TemporaryResource | ErrorClassification::Timeout
        )
    }
}
