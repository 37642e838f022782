//! Query executor
//!
//! Drives an engine cursor over a prepared tree and collects every fetched
//! level row into a [`ResultStore`].
//!
//! For each aligned set of rows, levels are visited root first:
//! 1. A level whose parent is NULL is NULL too and pushes nothing.
//! 2. A level the cursor reports NULL pushes a NULL-tagged header.
//! 3. A level whose bytes equal its most recent non-null push is skipped.
//! 4. Anything else pushes a copy of the level buffer.
//!
//! One executor runs one query; it never retries.

use std::fmt;
use std::sync::Arc;

use super::buffer::RowBuffer;
use super::errors::{QueryError, QueryResult};
use super::result::{ResultHeader, ResultStore};
use crate::builder::PreparedQuery;
use crate::config::ClientConfig;
use crate::engine::{
    AbortOption, ExecType, FetchStatus, QueryCursor, Record, SendPolicy, TransactionHandle,
};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, ObservationScope};

/// Executor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// No cursor yet
    NotStarted,
    /// Cursor created, rows may be pending
    Fetching,
    /// Cursor reached scan-complete; results are final
    Drained,
    /// Creation, round trip or fetch failed; see `latest_error`
    Failed,
}

impl QueryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryState::NotStarted => "NOT_STARTED",
            QueryState::Fetching => "FETCHING",
            QueryState::Drained => "DRAINED",
            QueryState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runs one prepared tree and owns its results
pub struct QueryExecutor {
    query: PreparedQuery,
    rows: Vec<RowBuffer>,
    null_levels: Vec<bool>,
    results: ResultStore,
    cursor: Option<Box<dyn QueryCursor>>,
    state: QueryState,
    latest_error: Option<QueryError>,
    abort: AbortOption,
    send: SendPolicy,
}

impl QueryExecutor {
    /// Executor with default configuration
    pub fn from_prepared(query: PreparedQuery) -> Self {
        Self::with_config(query, &ClientConfig::default())
    }

    /// Executor whose buffers come from the row records and join flags
    /// carried by `query`. Levels without a record stay unbound until
    /// [`QueryExecutor::create_row_buffer`].
    pub fn with_config(query: PreparedQuery, config: &ClientConfig) -> Self {
        let rows = query
            .nodes()
            .iter()
            .map(|node| {
                let mut buffer = match node.row_record() {
                    Some(record) => RowBuffer::new(record.clone()),
                    None => RowBuffer::unbound(),
                };
                if node.is_join_only() {
                    buffer.mark_join_only();
                }
                buffer
            })
            .collect();
        let levels = query.levels();

        Self {
            query,
            rows,
            null_levels: vec![false; levels],
            results: ResultStore::new(config.initial_result_capacity),
            cursor: None,
            state: QueryState::NotStarted,
            latest_error: None,
            abort: config.default_abort_option,
            send: config.default_send_policy,
        }
    }

    /// Allocate a buffer sized to `record` and bind it to `level`.
    ///
    /// Flags already set on the level are kept.
    pub fn create_row_buffer(&mut self, level: usize, record: Arc<Record>) -> QueryResult<()> {
        self.require_state(QueryState::NotStarted, "create_row_buffer")?;
        let levels = self.rows.len();
        let slot = self
            .rows
            .get_mut(level)
            .ok_or_else(|| QueryError::level_out_of_range(level, levels))?;

        let mut buffer = RowBuffer::new(record);
        if slot.is_join_only() {
            buffer.mark_join_only();
        }
        *slot = buffer;
        Ok(())
    }

    /// Exclude `level`'s rows from the user-visible results.
    pub fn mark_join_only(&mut self, level: usize) -> QueryResult<()> {
        self.require_state(QueryState::NotStarted, "mark_join_only")?;
        let levels = self.rows.len();
        self.rows
            .get_mut(level)
            .ok_or_else(|| QueryError::level_out_of_range(level, levels))?
            .mark_join_only();
        Ok(())
    }

    /// Instantiate the engine cursor and bind the level buffers to it.
    ///
    /// On failure no cursor is kept and the executor moves to `Failed`.
    pub fn create_query(&mut self, tx: &TransactionHandle) -> QueryResult<()> {
        self.require_state(QueryState::NotStarted, "create_query")?;
        if let Some(level) = self.rows.iter().position(|r| !r.is_bound()) {
            return Err(QueryError::illegal_state(format!(
                "level {} has no row buffer",
                level
            )));
        }

        let query_id = self.query.id().to_string();
        match tx.with(|t| t.create_query(&self.query)).and_then(|r| r) {
            Ok(cursor) => {
                self.cursor = Some(cursor);
                self.state = QueryState::Fetching;
                let levels = self.query.levels().to_string();
                let transaction = tx.id().to_string();
                log_event_with_fields(
                    Event::QueryCreated,
                    &[
                        ("levels", &levels),
                        ("query", &query_id),
                        ("transaction", &transaction),
                    ],
                );
                Ok(())
            }
            Err(engine) => {
                let code = engine.code.to_string();
                log_event_with_fields(
                    Event::QueryCreateFailed,
                    &[("code", &code), ("query", &query_id)],
                );
                Err(self.fail(QueryError::create_failed(engine)))
            }
        }
    }

    /// Pull rows until the cursor completes or fails.
    ///
    /// Returns the number of headers in the store. A failure keeps the
    /// headers of every fully processed row; a row cut short by an
    /// allocation failure leaves none of its headers behind.
    pub fn fetch_all_results(&mut self) -> QueryResult<usize> {
        self.require_state(QueryState::Fetching, "fetch_all_results")?;
        let query_id = self.query.id().to_string();
        let scope = ObservationScope::with_fields("QUERY_FETCH", &[("query", &query_id)]);

        let outcome = self.drain_cursor();
        self.close();

        match outcome {
            Ok(()) => {
                self.state = QueryState::Drained;
                MetricsRegistry::global().increment_queries_executed();
                let rows = self.results.len().to_string();
                log_event_with_fields(
                    Event::FetchComplete,
                    &[("query", &query_id), ("rows", &rows)],
                );
                scope.complete_with_fields(&[("rows", &rows)]);
                Ok(self.results.len())
            }
            Err(err) => {
                log_event_with_fields(
                    Event::FetchFailed,
                    &[("code", err.code().code()), ("query", &query_id)],
                );
                if err.is_fatal() {
                    scope.fail_fatal(err.message());
                } else {
                    scope.fail(err.message());
                }
                Err(self.fail(err))
            }
        }
    }

    /// Create the query, run one no-commit round trip, then fetch all rows.
    pub fn prepare_and_execute(&mut self, tx: &TransactionHandle) -> QueryResult<usize> {
        self.create_query(tx)?;

        let (abort, send) = (self.abort, self.send);
        if let Err(engine) = tx
            .with(|t| t.execute(ExecType::NoCommit, abort, send))
            .and_then(|r| r)
        {
            self.close();
            return Err(self.fail(QueryError::round_trip_failed(engine)));
        }

        self.fetch_all_results()
    }

    /// Run [`QueryExecutor::prepare_and_execute`] on the blocking pool.
    ///
    /// The executor comes back with the fetch outcome, so partial results
    /// and `latest_error` stay readable after a failure. `Err` means the
    /// blocking task itself was lost, taking the executor with it.
    pub async fn execute_async(
        mut self,
        tx: TransactionHandle,
    ) -> QueryResult<(Self, QueryResult<usize>)> {
        let handle = tokio::task::spawn_blocking(move || {
            let fetched = self.prepare_and_execute(&tx);
            (self, fetched)
        });
        handle.await.map_err(|join| {
            QueryError::illegal_state(format!("fetch task did not complete: {}", join))
        })
    }

    /// Header at `index`, `None` when out of range
    pub fn get_result(&self, index: usize) -> Option<&ResultHeader> {
        self.results.get(index)
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    /// Headers of user-visible levels, in discovery order
    pub fn visible_results(&self) -> impl Iterator<Item = &ResultHeader> {
        self.results.iter().filter(|h| !h.is_join_only())
    }

    /// Take ownership of the bytes of header `index`.
    pub fn take_result_data(&mut self, index: usize) -> Option<Box<[u8]>> {
        self.results.take_data(index)
    }

    /// Row image size of `depth`'s buffer
    pub fn result_row_size(&self, depth: usize) -> Option<usize> {
        self.rows.get(depth).map(RowBuffer::size)
    }

    pub fn row_buffer(&self, level: usize) -> Option<&RowBuffer> {
        self.rows.get(level)
    }

    pub fn query(&self) -> &PreparedQuery {
        &self.query
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    /// Error that ended the most recent attempt
    pub fn latest_error(&self) -> Option<&QueryError> {
        self.latest_error.as_ref()
    }

    /// Close and detach the cursor, if one is live.
    pub fn close(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }
    }

    fn drain_cursor(&mut self) -> QueryResult<()> {
        loop {
            let status = match self.cursor.as_mut() {
                Some(cursor) => cursor.next_result(&mut self.rows),
                None => return Err(QueryError::illegal_state("cursor detached during fetch")),
            };

            match status {
                FetchStatus::GotRow => {
                    let mark = self.results.len();
                    if let Err(err) = self.push_row() {
                        self.results.truncate(mark);
                        return Err(err);
                    }
                }
                FetchStatus::BufferEmpty => continue,
                FetchStatus::ScanComplete => return Ok(()),
                FetchStatus::Error => {
                    let engine = self.cursor.as_ref().and_then(|c| c.last_error());
                    return Err(QueryError::cursor_failed(engine));
                }
            }
        }
    }

    fn push_row(&mut self) -> QueryResult<()> {
        let cursor = self
            .cursor
            .as_deref()
            .ok_or_else(|| QueryError::illegal_state("cursor detached during fetch"))?;
        let metrics = MetricsRegistry::global();

        for level in 0..self.rows.len() {
            let parent_null = self
                .query
                .parent_of(level)
                .is_some_and(|parent| self.null_levels[parent]);
            if parent_null {
                self.null_levels[level] = true;
                continue;
            }

            let is_null = cursor.is_row_null(level);
            self.null_levels[level] = is_null;

            // Levels are capped well below u16::MAX by the builder.
            let depth = level as u16;
            let buffer = &self.rows[level];

            if is_null {
                self.results.push_null(depth, buffer.flags())?;
                metrics.increment_null_rows_pushed();
                continue;
            }

            let duplicate = buffer
                .last_copy()
                .and_then(|index| self.results.get(index))
                .and_then(ResultHeader::data)
                .is_some_and(|last| last == buffer.as_slice());
            if duplicate {
                metrics.increment_duplicates_suppressed();
                continue;
            }

            let index = self
                .results
                .push_value(depth, buffer.flags(), buffer.as_slice())?;
            self.rows[level].set_last_copy(index);
            metrics.increment_rows_pushed();
        }
        Ok(())
    }

    fn require_state(&self, expected: QueryState, call: &str) -> QueryResult<()> {
        if self.state != expected {
            return Err(QueryError::illegal_state(format!(
                "{} requires state {}, executor is {}",
                call, expected, self.state
            )));
        }
        Ok(())
    }

    fn fail(&mut self, err: QueryError) -> QueryError {
        self.state = QueryState::Failed;
        self.latest_error = Some(err.clone());
        MetricsRegistry::global().increment_queries_failed();
        err
    }
}

impl fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("query", &self.query.id())
            .field("state", &self.state)
            .field("results", &self.results.len())
            .field("cursor_open", &self.cursor.is_some())
            .finish()
    }
}

impl Drop for QueryExecutor {
    fn drop(&mut self) {
        self.close();
    }
}
