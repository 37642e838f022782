//! Batch coordinator
//!
//! Groups independent key operations into one round trip and reports one
//! outcome per entry. The entry count is fixed at construction.
//!
//! Lifecycle: `Built` → `prepare` → `Prepared` → `execute` → `Executed`.
//! Outcomes are readable only in `Executed`.

use super::entry::{BatchEntry, EntryOutcome, ErrorSlot, KeyOperation};
use super::errors::{BatchError, BatchResult};
use crate::engine::{AbortOption, EngineError, ExecType, SendPolicy, TransactionHandle};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, ObservationScope};

/// Coordinator lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchState {
    #[default]
    Built,
    Prepared,
    Executed,
}

impl BatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchState::Built => "BUILT",
            BatchState::Prepared => "PREPARED",
            BatchState::Executed => "EXECUTED",
        }
    }
}

/// Outcome of one round trip: exactly one entry outcome per batch entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    exec: ExecType,
    outcomes: Vec<EntryOutcome>,
    transaction_error: Option<EngineError>,
}

impl ExecutionReport {
    pub fn exec(&self) -> ExecType {
        self.exec
    }

    pub fn outcomes(&self) -> &[EntryOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of entries that did not succeed
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }

    pub fn transaction_error(&self) -> Option<&EngineError> {
        self.transaction_error.as_ref()
    }
}

/// Fixed set of key operations executed as one round trip
#[derive(Debug)]
pub struct BatchCoordinator {
    entries: Box<[BatchEntry]>,
    transaction: Option<TransactionHandle>,
    transaction_error: Option<EngineError>,
    state: BatchState,
    reads_blobs: bool,
}

impl BatchCoordinator {
    pub fn new(operations: Vec<KeyOperation>) -> Self {
        let reads_blobs = operations.iter().any(KeyOperation::reads_blobs);
        Self {
            entries: operations.into_iter().map(BatchEntry::new).collect(),
            transaction: None,
            transaction_error: None,
            state: BatchState::Built,
            reads_blobs,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn entry(&self, n: usize) -> Option<&BatchEntry> {
        self.entries.get(n)
    }

    /// True when any entry reads a large object back
    pub fn has_blob_reads(&self) -> bool {
        self.reads_blobs
    }

    pub fn transaction(&self) -> Option<&TransactionHandle> {
        self.transaction.as_ref()
    }

    /// Record a define-time failure for entry `n`. The entry is not sent.
    pub fn set_error(&mut self, n: usize, err: EngineError) -> BatchResult<()> {
        if self.state == BatchState::Executed {
            return Err(self.illegal("set_error", "BUILT or PREPARED"));
        }
        let len = self.entries.len();
        let entry = self
            .entries
            .get_mut(n)
            .ok_or(BatchError::EntryOutOfRange { index: n, len })?;
        entry.slot = ErrorSlot::Operation(err);
        entry.id = None;
        Ok(())
    }

    /// Define every entry on `tx` in order.
    ///
    /// An entry the transaction refuses keeps the refusal as its own error;
    /// the rest of the batch is unaffected.
    pub fn prepare(&mut self, tx: &TransactionHandle) -> BatchResult<()> {
        self.require(BatchState::Built, "prepare")?;

        let entries = &mut self.entries;
        let defined = tx.with(|t| {
            let mut defined = 0usize;
            for entry in entries.iter_mut() {
                if matches!(entry.slot, ErrorSlot::Operation(_)) {
                    continue;
                }
                match t.define_operation(&entry.operation) {
                    Ok(id) => {
                        entry.id = Some(id);
                        defined += 1;
                    }
                    Err(err) => entry.slot = ErrorSlot::Operation(err),
                }
            }
            defined
        })?;

        self.transaction = Some(tx.clone());
        self.state = BatchState::Prepared;

        let size = self.entries.len().to_string();
        let defined = defined.to_string();
        let transaction = tx.id().to_string();
        log_event_with_fields(
            Event::BatchPrepared,
            &[
                ("defined", &defined),
                ("size", &size),
                ("transaction", &transaction),
            ],
        );
        Ok(())
    }

    /// Ask the transaction to start now, hinted by the first entry.
    pub fn try_immediate_start_transaction(&self) -> BatchResult<bool> {
        let tx = self.bound_transaction("try_immediate_start_transaction")?;
        let hint = self.entries.first().map(BatchEntry::operation);
        Ok(tx.with(|t| t.try_start(hint))?)
    }

    /// Run the whole batch as one blocking round trip.
    ///
    /// Entry failures and a failed round trip are reported in the
    /// [`ExecutionReport`]; `Err` means the batch could not be run at all.
    /// A committing or rolling back round trip marks the transaction closed
    /// before this returns.
    pub fn execute(
        &mut self,
        exec: ExecType,
        abort: AbortOption,
        send: SendPolicy,
    ) -> BatchResult<ExecutionReport> {
        let tx = self.begin_execute("execute", exec, abort, send)?;
        let scope = self.execute_scope(exec);
        let collected = round_trip(&mut self.entries, &tx, exec, abort, send);
        self.complete(exec, collected, scope, &tx)
    }

    /// Run the round trip on the blocking pool.
    ///
    /// The blocking task works on a copy of the entries; the batch itself is
    /// only updated once the task has finished. A future dropped before then
    /// leaves the batch `Prepared` with every entry and its transaction in
    /// place, although the round trip may still reach the engine.
    pub async fn execute_async(
        &mut self,
        exec: ExecType,
        abort: AbortOption,
        send: SendPolicy,
    ) -> BatchResult<ExecutionReport> {
        let tx = self.begin_execute("execute_async", exec, abort, send)?;
        let scope = self.execute_scope(exec);

        let mut entries = self.entries.clone();
        let worker_tx = tx.clone();
        let task = tokio::task::spawn_blocking(move || {
            let collected = round_trip(&mut entries, &worker_tx, exec, abort, send);
            (entries, collected)
        });

        match task.await {
            Ok((entries, collected)) => {
                self.entries = entries;
                self.complete(exec, collected, scope, &tx)
            }
            Err(join) => {
                let err = BatchError::TaskFailed(join.to_string());
                scope.fail(&err.to_string());
                Err(err)
            }
        }
    }

    /// Start the round trip and return immediately.
    ///
    /// `notify` receives the batch back with the result exactly once. Inside
    /// a tokio runtime the round trip runs on a spawned task and its handle
    /// is returned; outside one it runs on the calling thread and `notify`
    /// has fired by the time this returns `None`.
    pub fn submit<F>(
        self,
        exec: ExecType,
        abort: AbortOption,
        send: SendPolicy,
        notify: F,
    ) -> Option<tokio::task::JoinHandle<()>>
    where
        F: FnOnce(BatchCoordinator, BatchResult<ExecutionReport>) + Send + 'static,
    {
        let mut batch = self;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn(async move {
                let result = batch.execute_async(exec, abort, send).await;
                notify(batch, result);
            })),
            Err(_) => {
                let result = batch.execute(exec, abort, send);
                notify(batch, result);
                None
            }
        }
    }

    /// Outcome of entry `n` after execution.
    pub fn outcome(&self, n: usize) -> BatchResult<EntryOutcome> {
        self.require(BatchState::Executed, "outcome")?;
        let entry = self.entries.get(n).ok_or(BatchError::EntryOutOfRange {
            index: n,
            len: self.entries.len(),
        })?;
        Ok(self.outcome_of(entry))
    }

    /// Error for entry `n`: its own error if it has one, otherwise the
    /// transaction's error, otherwise `None`.
    pub fn get_error(&self, n: usize) -> BatchResult<Option<EngineError>> {
        Ok(self.outcome(n)?.into_error())
    }

    /// Transaction-level error from the last round trip
    pub fn transaction_error(&self) -> Option<&EngineError> {
        self.transaction_error.as_ref()
    }

    /// `(field_number, bytes)` for every large object entry `n` read back
    pub fn read_blob_results(&self, n: usize) -> BatchResult<Vec<(usize, Vec<u8>)>> {
        self.require(BatchState::Executed, "read_blob_results")?;
        let entry = self.entries.get(n).ok_or(BatchError::EntryOutOfRange {
            index: n,
            len: self.entries.len(),
        })?;
        Ok(entry
            .operation
            .blobs
            .iter()
            .filter_map(|b| b.data().map(|d| (b.field_number(), d.to_vec())))
            .collect())
    }

    fn begin_execute(
        &self,
        call: &'static str,
        exec: ExecType,
        abort: AbortOption,
        send: SendPolicy,
    ) -> BatchResult<TransactionHandle> {
        let tx = self.bound_transaction(call)?.clone();
        self.require(BatchState::Prepared, call)?;

        let size = self.entries.len().to_string();
        let transaction = tx.id().to_string();
        log_event_with_fields(
            Event::BatchExecuteStart,
            &[
                ("abort", abort.as_str()),
                ("exec", exec.as_str()),
                ("send", send.as_str()),
                ("size", &size),
                ("transaction", &transaction),
            ],
        );
        Ok(tx)
    }

    fn execute_scope(&self, exec: ExecType) -> ObservationScope<'static> {
        let size = self.entries.len().to_string();
        ObservationScope::with_fields("BATCH_EXECUTE", &[("exec", exec.as_str()), ("size", &size)])
    }

    /// Record the collected round trip and build the report.
    fn complete(
        &mut self,
        exec: ExecType,
        collected: Result<Option<EngineError>, EngineError>,
        scope: ObservationScope<'static>,
        tx: &TransactionHandle,
    ) -> BatchResult<ExecutionReport> {
        let transaction_error = match collected {
            Ok(err) => err,
            Err(err) => {
                scope.fail(&err.message);
                return Err(err.into());
            }
        };

        self.transaction_error = transaction_error;
        self.state = BatchState::Executed;
        let outcomes: Vec<EntryOutcome> = self.entries.iter().map(|e| self.outcome_of(e)).collect();
        let report = ExecutionReport {
            exec,
            outcomes,
            transaction_error: self.transaction_error.clone(),
        };

        let metrics = MetricsRegistry::global();
        metrics.increment_batches_executed();
        metrics.add_batch_entry_failures(report.failures() as u64);

        let failures = report.failures().to_string();
        let transaction = tx.id().to_string();
        match &report.transaction_error {
            Some(err) => {
                let code = err.code.to_string();
                log_event_with_fields(
                    Event::BatchExecuteFailed,
                    &[
                        ("code", &code),
                        ("failures", &failures),
                        ("transaction", &transaction),
                    ],
                );
                scope.fail(&err.message);
            }
            None => {
                log_event_with_fields(
                    Event::BatchExecuteComplete,
                    &[("failures", &failures), ("transaction", &transaction)],
                );
                scope.complete_with_fields(&[("failures", &failures)]);
            }
        }
        Ok(report)
    }

    fn outcome_of(&self, entry: &BatchEntry) -> EntryOutcome {
        match &entry.slot {
            ErrorSlot::Clear => EntryOutcome::Success,
            ErrorSlot::Operation(err) => EntryOutcome::Operation(err.clone()),
            ErrorSlot::Transaction => EntryOutcome::Transaction(
                self.transaction_error
                    .clone()
                    .unwrap_or_else(|| EngineError::internal("transaction error not recorded")),
            ),
        }
    }

    fn bound_transaction(&self, call: &'static str) -> BatchResult<&TransactionHandle> {
        self.transaction
            .as_ref()
            .ok_or_else(|| self.illegal(call, "PREPARED"))
    }

    fn require(&self, required: BatchState, call: &'static str) -> BatchResult<()> {
        if self.state != required {
            return Err(self.illegal(call, required.as_str()));
        }
        Ok(())
    }

    fn illegal(&self, call: &'static str, required: &'static str) -> BatchError {
        BatchError::IllegalState {
            call,
            state: self.state.as_str(),
            required,
        }
    }
}

/// Execute on `tx` and collect each entry's error and large-object reads.
///
/// Returns the transaction-level error, if any. A committing or rolling back
/// round trip registers the transaction as closed before returning.
fn round_trip(
    entries: &mut [BatchEntry],
    tx: &TransactionHandle,
    exec: ExecType,
    abort: AbortOption,
    send: SendPolicy,
) -> Result<Option<EngineError>, EngineError> {
    let transaction_error = tx.with(|t| {
        let round_trip = t.execute(exec, abort, send);
        let transaction_error = t
            .error()
            .filter(|e| !e.is_ok())
            .or_else(|| round_trip.err());

        for entry in entries.iter_mut() {
            if matches!(entry.slot, ErrorSlot::Operation(_)) {
                continue;
            }
            let Some(id) = entry.id else {
                continue;
            };
            if let Some(err) = t.operation_error(id).filter(|e| !e.is_ok()) {
                entry.slot = ErrorSlot::Operation(err);
                continue;
            }
            if transaction_error.is_some() {
                entry.slot = ErrorSlot::Transaction;
                continue;
            }
            for blob in entry.operation.blobs.iter_mut().filter(|b| b.is_read()) {
                if let Some(bytes) = t.read_blob(id, blob.column_id()) {
                    blob.fill(bytes);
                }
            }
        }
        transaction_error
    })?;

    if exec.closes_transaction() {
        tx.register_close();
    }
    Ok(transaction_error)
}
