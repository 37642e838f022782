//! Key operations and per-entry error slots

use std::fmt;
use std::sync::Arc;

use super::blob::BlobHandler;
use crate::engine::{EngineError, OperationId, TableRef};

/// Kind of single-row key operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOpcode {
    Read,
    Insert,
    Update,
    /// Insert or overwrite
    Write,
    Delete,
}

impl KeyOpcode {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyOpcode::Read => "READ",
            KeyOpcode::Insert => "INSERT",
            KeyOpcode::Update => "UPDATE",
            KeyOpcode::Write => "WRITE",
            KeyOpcode::Delete => "DELETE",
        }
    }
}

impl fmt::Display for KeyOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One primary-key operation, row images in the engine's native format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOperation {
    pub opcode: KeyOpcode,
    pub table: Arc<TableRef>,
    pub key: Vec<u8>,
    /// Row image to write; `None` for reads and deletes
    pub row: Option<Vec<u8>>,
    pub blobs: Vec<BlobHandler>,
}

impl KeyOperation {
    fn new(opcode: KeyOpcode, table: Arc<TableRef>, key: Vec<u8>, row: Option<Vec<u8>>) -> Self {
        Self {
            opcode,
            table,
            key,
            row,
            blobs: Vec::new(),
        }
    }

    pub fn read(table: Arc<TableRef>, key: impl Into<Vec<u8>>) -> Self {
        Self::new(KeyOpcode::Read, table, key.into(), None)
    }

    pub fn insert(table: Arc<TableRef>, key: impl Into<Vec<u8>>, row: impl Into<Vec<u8>>) -> Self {
        Self::new(KeyOpcode::Insert, table, key.into(), Some(row.into()))
    }

    pub fn update(table: Arc<TableRef>, key: impl Into<Vec<u8>>, row: impl Into<Vec<u8>>) -> Self {
        Self::new(KeyOpcode::Update, table, key.into(), Some(row.into()))
    }

    pub fn write(table: Arc<TableRef>, key: impl Into<Vec<u8>>, row: impl Into<Vec<u8>>) -> Self {
        Self::new(KeyOpcode::Write, table, key.into(), Some(row.into()))
    }

    pub fn delete(table: Arc<TableRef>, key: impl Into<Vec<u8>>) -> Self {
        Self::new(KeyOpcode::Delete, table, key.into(), None)
    }

    pub fn with_blob(mut self, handler: BlobHandler) -> Self {
        self.blobs.push(handler);
        self
    }

    /// True when any attached handler reads a large object back
    pub fn reads_blobs(&self) -> bool {
        self.blobs.iter().any(BlobHandler::is_read)
    }
}

/// Error state of one entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ErrorSlot {
    #[default]
    Clear,
    /// The operation itself failed
    Operation(EngineError),
    /// The operation has no error of its own but the transaction failed
    Transaction,
}

/// Final result of one entry after a round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Success,
    Operation(EngineError),
    Transaction(EngineError),
}

impl EntryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, EntryOutcome::Success)
    }

    pub fn error(&self) -> Option<&EngineError> {
        match self {
            EntryOutcome::Success => None,
            EntryOutcome::Operation(err) | EntryOutcome::Transaction(err) => Some(err),
        }
    }

    pub fn into_error(self) -> Option<EngineError> {
        match self {
            EntryOutcome::Success => None,
            EntryOutcome::Operation(err) | EntryOutcome::Transaction(err) => Some(err),
        }
    }
}

/// One slot of a batch
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub(crate) operation: KeyOperation,
    pub(crate) id: Option<OperationId>,
    pub(crate) slot: ErrorSlot,
}

impl BatchEntry {
    pub(crate) fn new(operation: KeyOperation) -> Self {
        Self {
            operation,
            id: None,
            slot: ErrorSlot::Clear,
        }
    }

    pub fn operation(&self) -> &KeyOperation {
        &self.operation
    }

    /// Engine id, once the entry has been defined on a transaction
    pub fn id(&self) -> Option<OperationId> {
        self.id
    }

    pub fn slot(&self) -> &ErrorSlot {
        &self.slot
    }
}
