//! Query execution error types
//!
//! Execution errors end the current fetch and are kept as the executor's
//! latest error. Allocation failures are FATAL for the fetch: no header
//! written after the failure point is readable.
//!
//! Error codes:
//! - QRY_CREATE_FAILED: cursor could not be instantiated
//! - QRY_CURSOR_FAILED: cursor reported an error mid-fetch
//! - QRY_ROUND_TRIP_FAILED: execute round trip failed
//! - QRY_ALLOCATION_FAILED: header array or row copy could not be allocated
//! - QRY_ILLEGAL_STATE: call made in the wrong executor state
//! - QRY_LEVEL_OUT_OF_RANGE: level index past the tree's depth

use std::fmt;

use crate::engine::EngineError;

/// Severity levels for query errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The fetch ended; results collected so far stay readable
    Error,
    /// The fetch ended and its results must not be trusted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Query error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorCode {
    QryCreateFailed,
    QryCursorFailed,
    QryRoundTripFailed,
    QryAllocationFailed,
    QryIllegalState,
    QryLevelOutOfRange,
}

impl QueryErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            QueryErrorCode::QryCreateFailed => "QRY_CREATE_FAILED",
            QueryErrorCode::QryCursorFailed => "QRY_CURSOR_FAILED",
            QueryErrorCode::QryRoundTripFailed => "QRY_ROUND_TRIP_FAILED",
            QueryErrorCode::QryAllocationFailed => "QRY_ALLOCATION_FAILED",
            QueryErrorCode::QryIllegalState => "QRY_ILLEGAL_STATE",
            QueryErrorCode::QryLevelOutOfRange => "QRY_LEVEL_OUT_OF_RANGE",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            QueryErrorCode::QryAllocationFailed => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for QueryErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Query error with the engine error that caused it, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    code: QueryErrorCode,
    message: String,
    engine: Option<EngineError>,
}

impl QueryError {
    pub fn create_failed(engine: EngineError) -> Self {
        Self {
            code: QueryErrorCode::QryCreateFailed,
            message: format!("Could not create query: {}", engine.message),
            engine: Some(engine),
        }
    }

    /// Cursor failure. `engine` is `None` when the cursor reported an error
    /// status without an error object.
    pub fn cursor_failed(engine: Option<EngineError>) -> Self {
        let message = match &engine {
            Some(e) => format!("Cursor failed: {}", e.message),
            None => "Cursor failed without an error object".to_string(),
        };
        Self {
            code: QueryErrorCode::QryCursorFailed,
            message,
            engine,
        }
    }

    pub fn round_trip_failed(engine: EngineError) -> Self {
        Self {
            code: QueryErrorCode::QryRoundTripFailed,
            message: format!("Execute failed: {}", engine.message),
            engine: Some(engine),
        }
    }

    /// Allocation failure (FATAL)
    pub fn allocation_failed(what: &str, bytes: usize) -> Self {
        Self {
            code: QueryErrorCode::QryAllocationFailed,
            message: format!("Could not allocate {} bytes for {}", bytes, what),
            engine: None,
        }
    }

    pub fn illegal_state(reason: impl Into<String>) -> Self {
        Self {
            code: QueryErrorCode::QryIllegalState,
            message: reason.into(),
            engine: None,
        }
    }

    pub fn level_out_of_range(level: usize, levels: usize) -> Self {
        Self {
            code: QueryErrorCode::QryLevelOutOfRange,
            message: format!("Level {} out of range; query has {} levels", level, levels),
            engine: None,
        }
    }

    pub fn code(&self) -> QueryErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Engine error behind this failure
    pub fn engine_error(&self) -> Option<&EngineError> {
        self.engine.as_ref()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.engine
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
