//! In-memory engine for integration tests
//!
//! - `MockTransaction`: records definitions and round trips, returns
//!   configured per-key errors and large-object values
//! - `ScriptedCursor`: replays a fixed list of fetch steps
//!
//! Every call is recorded in a shared `TxLog` so tests can inspect the
//! transaction after handing it to a `TransactionHandle`.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use clusterq::batch::KeyOperation;
use clusterq::builder::PreparedQuery;
use clusterq::engine::{
    AbortOption, EngineError, ErrorClassification, ExecType, FetchStatus, OperationId,
    QueryCursor, Record, SendPolicy, TableRef, Transaction,
};
use clusterq::query::RowBuffer;

// =============================================================================
// Schema helpers
// =============================================================================

pub fn table(name: &str, columns: &[&str], primary_key: &[&str]) -> Arc<TableRef> {
    Arc::new(TableRef::new(
        name,
        columns.iter().copied(),
        primary_key.iter().copied(),
    ))
}

/// Record of `columns` one-byte-wide columns
pub fn byte_record(columns: &[&str]) -> Arc<Record> {
    Arc::new(Record::packed(columns.iter().map(|c| (*c, 1))))
}

pub fn lock_timeout() -> EngineError {
    EngineError::new(266, ErrorClassification::Timeout, "Time-out in NDB")
}

// =============================================================================
// Cursor
// =============================================================================

/// One scripted cursor step
#[derive(Debug, Clone)]
pub enum CursorStep {
    /// Per-level row images; `None` marks the level NULL
    Row(Vec<Option<Vec<u8>>>),
    Empty,
    Fail(EngineError),
}

impl CursorStep {
    pub fn row(levels: &[Option<&[u8]>]) -> Self {
        CursorStep::Row(levels.iter().map(|l| l.map(<[u8]>::to_vec)).collect())
    }
}

pub struct ScriptedCursor {
    steps: VecDeque<CursorStep>,
    nulls: Vec<bool>,
    error: Option<EngineError>,
    log: Arc<Mutex<TxLog>>,
}

impl QueryCursor for ScriptedCursor {
    fn next_result(&mut self, rows: &mut [RowBuffer]) -> FetchStatus {
        match self.steps.pop_front() {
            Some(CursorStep::Row(levels)) => {
                self.nulls = levels.iter().map(Option::is_none).collect();
                for (buffer, row) in rows.iter_mut().zip(levels) {
                    if let Some(row) = row {
                        buffer.fill(&row);
                    }
                }
                FetchStatus::GotRow
            }
            Some(CursorStep::Empty) => FetchStatus::BufferEmpty,
            Some(CursorStep::Fail(err)) => {
                self.error = Some(err);
                FetchStatus::Error
            }
            None => FetchStatus::ScanComplete,
        }
    }

    fn is_row_null(&self, level: usize) -> bool {
        self.nulls.get(level).copied().unwrap_or(false)
    }

    fn last_error(&self) -> Option<EngineError> {
        self.error.clone()
    }

    fn close(&mut self) {
        self.log.lock().unwrap().cursors_closed += 1;
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Everything the mock saw
#[derive(Debug, Default)]
pub struct TxLog {
    pub defined: Vec<Vec<u8>>,
    pub executes: Vec<(ExecType, AbortOption, SendPolicy)>,
    pub queries_created: usize,
    pub cursors_closed: usize,
    pub start_hint: Option<Vec<u8>>,
    pub closed: bool,
}

#[derive(Default)]
pub struct MockTransaction {
    cursor_script: Option<Vec<CursorStep>>,
    operation_errors: HashMap<Vec<u8>, EngineError>,
    refused_keys: HashMap<Vec<u8>, EngineError>,
    execute_error: Option<EngineError>,
    execute_delay: Option<Duration>,
    blobs: HashMap<(Vec<u8>, u32), Vec<u8>>,
    ids: Vec<Vec<u8>>,
    failed: Option<EngineError>,
    log: Arc<Mutex<TxLog>>,
}

impl MockTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(mut self, steps: Vec<CursorStep>) -> Self {
        self.cursor_script = Some(steps);
        self
    }

    /// Error the engine reports for the operation on `key` after execute
    pub fn with_operation_error(mut self, key: &[u8], err: EngineError) -> Self {
        self.operation_errors.insert(key.to_vec(), err);
        self
    }

    /// Error returned when defining the operation on `key`
    pub fn with_refused_key(mut self, key: &[u8], err: EngineError) -> Self {
        self.refused_keys.insert(key.to_vec(), err);
        self
    }

    /// Make the round trip fail as a whole
    pub fn with_execute_error(mut self, err: EngineError) -> Self {
        self.execute_error = Some(err);
        self
    }

    /// Hold the round trip for `delay` before it completes
    pub fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.execute_delay = Some(delay);
        self
    }

    pub fn with_blob(mut self, key: &[u8], column_id: u32, value: &[u8]) -> Self {
        self.blobs.insert((key.to_vec(), column_id), value.to_vec());
        self
    }

    pub fn log(&self) -> Arc<Mutex<TxLog>> {
        self.log.clone()
    }
}

impl Transaction for MockTransaction {
    fn define_operation(&mut self, op: &KeyOperation) -> Result<OperationId, EngineError> {
        if let Some(err) = self.refused_keys.get(&op.key) {
            return Err(err.clone());
        }
        self.ids.push(op.key.clone());
        self.log.lock().unwrap().defined.push(op.key.clone());
        Ok(self.ids.len() - 1)
    }

    fn create_query(&mut self, _query: &PreparedQuery) -> Result<Box<dyn QueryCursor>, EngineError> {
        let steps = self
            .cursor_script
            .take()
            .ok_or_else(|| EngineError::internal("no cursor scripted"))?;
        self.log.lock().unwrap().queries_created += 1;
        Ok(Box::new(ScriptedCursor {
            steps: steps.into(),
            nulls: Vec::new(),
            error: None,
            log: self.log.clone(),
        }))
    }

    fn execute(
        &mut self,
        exec: ExecType,
        abort: AbortOption,
        send: SendPolicy,
    ) -> Result<(), EngineError> {
        if let Some(delay) = self.execute_delay {
            thread::sleep(delay);
        }
        self.log.lock().unwrap().executes.push((exec, abort, send));
        match self.execute_error.clone() {
            Some(err) => {
                self.failed = Some(err.clone());
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn operation_error(&self, id: OperationId) -> Option<EngineError> {
        let key = self.ids.get(id)?;
        self.operation_errors.get(key).cloned()
    }

    fn error(&self) -> Option<EngineError> {
        self.failed.clone()
    }

    fn read_blob(&self, id: OperationId, column_id: u32) -> Option<Vec<u8>> {
        let key = self.ids.get(id)?;
        self.blobs.get(&(key.clone(), column_id)).cloned()
    }

    fn try_start(&mut self, hint: Option<&KeyOperation>) -> bool {
        self.log.lock().unwrap().start_hint = hint.map(|op| op.key.clone());
        hint.is_some()
    }

    fn close(&mut self) {
        self.log.lock().unwrap().closed = true;
    }
}
