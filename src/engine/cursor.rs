//! Executing multi-level query cursor supplied by the engine

use std::fmt;

use super::error::EngineError;
use crate::query::RowBuffer;

/// Outcome of one `next_result` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// A new aligned set of per-level rows was written into the buffers
    GotRow,
    /// No row yet; poll again
    BufferEmpty,
    /// No more rows
    ScanComplete,
    /// Cursor failed; details via `last_error`
    Error,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::GotRow => "GOT_ROW",
            FetchStatus::BufferEmpty => "BUFFER_EMPTY",
            FetchStatus::ScanComplete => "SCAN_COMPLETE",
            FetchStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Live handle for pulling successive rows of an executing query
///
/// The cursor writes each level's row image into `rows[level]`; buffers are
/// bound once and reused across calls.
pub trait QueryCursor: Send {
    /// Advance to the next aligned set of rows
    fn next_result(&mut self, rows: &mut [RowBuffer]) -> FetchStatus;

    /// Whether the most recent row at `level` is NULL (outer-join miss)
    fn is_row_null(&self, level: usize) -> bool;

    /// Last error recorded by the cursor
    fn last_error(&self) -> Option<EngineError>;

    /// Release the cursor's engine resources
    fn close(&mut self);
}
