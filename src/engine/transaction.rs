//! Transaction interface and shared handle
//!
//! The engine's transaction object is the only path to the network. This
//! crate calls define/execute/close on it and reads errors back; it never
//! retries and never enforces timeouts.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cursor::QueryCursor;
use super::error::EngineError;
use crate::batch::KeyOperation;
use crate::builder::PreparedQuery;
use crate::observability::{log_event_with_fields, Event};

/// Engine-assigned handle for an operation defined on a transaction
pub type OperationId = usize;

/// Commit behavior of a round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecType {
    /// Execute and keep the transaction open
    NoCommit,
    /// Execute and commit
    Commit,
    /// Abort the transaction
    Rollback,
}

impl ExecType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecType::NoCommit => "NO_COMMIT",
            ExecType::Commit => "COMMIT",
            ExecType::Rollback => "ROLLBACK",
        }
    }

    /// True when the transaction is finished after the round trip
    pub fn closes_transaction(&self) -> bool {
        !matches!(self, ExecType::NoCommit)
    }
}

impl fmt::Display for ExecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether one failing operation aborts the whole round trip
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortOption {
    /// Use each operation's own setting
    #[default]
    Default,
    /// First failure aborts the transaction
    AbortOnError,
    /// Failures stay local to their operation
    IgnoreError,
}

impl AbortOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortOption::Default => "DEFAULT",
            AbortOption::AbortOnError => "ABORT_ON_ERROR",
            AbortOption::IgnoreError => "IGNORE_ERROR",
        }
    }
}

/// Whether the round trip is flushed immediately
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendPolicy {
    /// May be grouped with other pending traffic
    #[default]
    Deferred,
    /// Flushed to the network immediately
    Force,
}

impl SendPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendPolicy::Deferred => "DEFERRED",
            SendPolicy::Force => "FORCE",
        }
    }
}

/// Live transaction supplied by the engine's client library
pub trait Transaction: Send {
    /// Define one key operation; the returned id is used to read its error.
    fn define_operation(&mut self, op: &KeyOperation) -> Result<OperationId, EngineError>;

    /// Instantiate an executing cursor for a prepared tree.
    fn create_query(&mut self, query: &PreparedQuery) -> Result<Box<dyn QueryCursor>, EngineError>;

    /// Run one blocking round trip for everything defined so far.
    fn execute(
        &mut self,
        exec: ExecType,
        abort: AbortOption,
        send: SendPolicy,
    ) -> Result<(), EngineError>;

    /// Error recorded for one operation, if any.
    fn operation_error(&self, id: OperationId) -> Option<EngineError>;

    /// Transaction-level error, if any.
    fn error(&self) -> Option<EngineError>;

    /// Large-object value read back for an operation after execution.
    fn read_blob(&self, id: OperationId, column_id: u32) -> Option<Vec<u8>>;

    /// Start the transaction now if possible, using `hint` to pick a node.
    fn try_start(&mut self, hint: Option<&KeyOperation>) -> bool {
        let _ = hint;
        false
    }

    /// Release the transaction.
    fn close(&mut self);
}

/// Shared handle to a live transaction
///
/// Cloning is cheap. Many executors and batches may hold the same handle;
/// each issues at most one round trip at a time through it.
#[derive(Clone)]
pub struct TransactionHandle {
    id: Uuid,
    inner: Arc<Mutex<Box<dyn Transaction>>>,
    closed: Arc<AtomicBool>,
}

impl TransactionHandle {
    pub fn new<T: Transaction + 'static>(transaction: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            inner: Arc::new(Mutex::new(Box::new(transaction))),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run `f` with exclusive access to the transaction.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn Transaction) -> R) -> Result<R, EngineError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| EngineError::internal("transaction lock poisoned"))?;
        Ok(f(&mut **guard))
    }

    /// Transaction-level error, if any.
    pub fn error(&self) -> Option<EngineError> {
        self.with(|tx| tx.error()).unwrap_or_else(Some)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Record that the transaction finished. Bookkeeping only; the engine
    /// already released it as part of the committing round trip.
    pub fn register_close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let id = self.id.to_string();
            log_event_with_fields(Event::TransactionClosed, &[("transaction", &id)]);
        }
    }

    /// Close the engine transaction and record it as closed.
    pub fn close(&self) -> Result<(), EngineError> {
        self.with(|tx| tx.close())?;
        self.register_close();
        Ok(())
    }
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullTransaction {
        closed: bool,
    }

    impl Transaction for NullTransaction {
        fn define_operation(&mut self, _op: &KeyOperation) -> Result<OperationId, EngineError> {
            Ok(0)
        }

        fn create_query(
            &mut self,
            _query: &PreparedQuery,
        ) -> Result<Box<dyn QueryCursor>, EngineError> {
            Err(EngineError::internal("queries not supported"))
        }

        fn execute(
            &mut self,
            _exec: ExecType,
            _abort: AbortOption,
            _send: SendPolicy,
        ) -> Result<(), EngineError> {
            Ok(())
        }

        fn operation_error(&self, _id: OperationId) -> Option<EngineError> {
            None
        }

        fn error(&self) -> Option<EngineError> {
            if self.closed {
                Some(EngineError::internal("closed"))
            } else {
                None
            }
        }

        fn read_blob(&self, _id: OperationId, _column_id: u32) -> Option<Vec<u8>> {
            None
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    #[test]
    fn test_exec_type_closes() {
        assert!(!ExecType::NoCommit.closes_transaction());
        assert!(ExecType::Commit.closes_transaction());
        assert!(ExecType::Rollback.closes_transaction());
    }

    #[test]
    fn test_options_deserialize_snake_case() {
        let abort: AbortOption = serde_json::from_str("\"ignore_error\"").unwrap();
        assert_eq!(abort, AbortOption::IgnoreError);
        let send: SendPolicy = serde_json::from_str("\"force\"").unwrap();
        assert_eq!(send, SendPolicy::Force);
    }

    #[test]
    fn test_handle_close_registers() {
        let handle = TransactionHandle::new(NullTransaction { closed: false });
        let shared = handle.clone();
        assert!(!shared.is_closed());
        assert!(handle.error().is_none());

        handle.close().unwrap();
        assert!(shared.is_closed());
        assert!(shared.error().is_some());
    }

    #[test]
    fn test_register_close_is_idempotent() {
        let handle = TransactionHandle::new(NullTransaction { closed: false });
        handle.register_close();
        handle.register_close();
        assert!(handle.is_closed());
    }
}
