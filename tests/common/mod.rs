//! Common test utilities for chunkquery integration tests.
//!
//! [`RecordingDriver`] is an in-memory [`DriverProtocol`] serving one scripted
//! result set. Every call it receives is appended to a shared [`Recorder`],
//! so tests can assert on the exact driver traffic after the driver has been
//! moved into a session.
//!
//! Failures are injected per step with [`Failure`].

#![allow(dead_code)]

use async_trait::async_trait;
use chunkquery::driver::{
    ColumnMetadata, CursorHandle, DriverProtocol, ParameterMetadata, PrepareOptions,
    StatementHandle, StatementOption,
};
use chunkquery::error::DriverError;
use chunkquery::{Session, SessionConfig, SqlValue};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// One driver call, in the order received.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Prepare { sql: String, options: PrepareOptions },
    SetFetchSize { statement: u64, rows: usize },
    Option { statement: u64, option: StatementOption },
    Bind { statement: u64, position: usize, value: SqlValue },
    AddBatch { statement: u64 },
    ExecuteBatch { statement: u64 },
    ExecuteQuery { statement: u64 },
    ExecuteUpdate { statement: u64 },
    GeneratedKeys { statement: u64 },
    ParameterMetadata { statement: u64 },
    ColumnMetadata { statement: u64 },
    NextRow { cursor: u64 },
    CloseCursor { cursor: u64 },
    CloseStatement { statement: u64 },
}

/// Driver step that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Failure {
    Prepare,
    SetFetchSize,
    Bind,
    ExecuteQuery,
    ExecuteUpdate,
    ExecuteBatch,
    GeneratedKeys,
    Metadata,
    /// Fail the advance after this many rows have been produced
    NextRowAfter(usize),
    CloseCursor,
    CloseStatement,
}

/// Shared log of driver calls.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    /// Snapshot of every call so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Number of calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }

    pub fn prepares(&self) -> usize {
        self.count(|event| matches!(event, Event::Prepare { .. }))
    }

    pub fn statement_closes(&self) -> usize {
        self.count(|event| matches!(event, Event::CloseStatement { .. }))
    }

    pub fn cursor_closes(&self) -> usize {
        self.count(|event| matches!(event, Event::CloseCursor { .. }))
    }

    pub fn advances(&self) -> usize {
        self.count(|event| matches!(event, Event::NextRow { .. }))
    }

    /// Index of the first call matching `predicate`.
    pub fn position(&self, predicate: impl Fn(&Event) -> bool) -> Option<usize> {
        self.events().iter().position(predicate)
    }
}

#[derive(Debug, Default)]
struct StatementState {
    max_rows: Option<usize>,
    batch_entries: usize,
    pending_keys: usize,
}

#[derive(Debug)]
struct CursorState {
    rows: Vec<Vec<SqlValue>>,
    /// Index of the current row; `None` before the first advance
    current: Option<usize>,
}

/// In-memory driver serving a scripted result set.
pub struct RecordingDriver {
    recorder: Recorder,
    rows: Vec<Vec<SqlValue>>,
    parameters: Vec<ParameterMetadata>,
    columns: Vec<ColumnMetadata>,
    update_count: i64,
    failures: HashSet<Failure>,
    statements: HashMap<u64, StatementState>,
    cursors: HashMap<u64, CursorState>,
    next_handle: u64,
    next_key: i64,
    produced: usize,
}

impl RecordingDriver {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            rows: Vec::new(),
            parameters: Vec::new(),
            columns: Vec::new(),
            update_count: 1,
            failures: HashSet::new(),
            statements: HashMap::new(),
            cursors: HashMap::new(),
            next_handle: 1,
            next_key: 1,
            produced: 0,
        }
    }

    /// Result set returned by every query.
    pub fn with_rows(mut self, rows: Vec<Vec<SqlValue>>) -> Self {
        self.rows = rows;
        self
    }

    /// Single-column integer result set.
    pub fn with_integers(self, values: impl IntoIterator<Item = i64>) -> Self {
        self.with_rows(
            values
                .into_iter()
                .map(|value| vec![SqlValue::Integer(value)])
                .collect(),
        )
    }

    pub fn with_parameters(mut self, parameters: Vec<ParameterMetadata>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_columns(mut self, columns: Vec<ColumnMetadata>) -> Self {
        self.columns = columns;
        self
    }

    /// Row count reported by updates; also the number of keys they generate.
    pub fn with_update_count(mut self, count: i64) -> Self {
        self.update_count = count;
        self
    }

    pub fn failing(mut self, failure: Failure) -> Self {
        self.failures.insert(failure);
        self
    }

    fn fail(&self, failure: Failure) -> Result<(), DriverError> {
        if self.failures.contains(&failure) {
            Err(DriverError::Io(format!("injected failure at {:?}", failure)))
        } else {
            Ok(())
        }
    }

    fn handle(&mut self) -> u64 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }

    fn statement(&mut self, statement: StatementHandle) -> Result<&mut StatementState, DriverError> {
        self.statements
            .get_mut(&statement.id())
            .ok_or(DriverError::StatementNotOpen(statement.id()))
    }

    fn open_cursor(&mut self, rows: Vec<Vec<SqlValue>>) -> CursorHandle {
        let id = self.handle();
        self.cursors.insert(id, CursorState { rows, current: None });
        CursorHandle::new(id)
    }
}

#[async_trait]
impl DriverProtocol for RecordingDriver {
    async fn prepare(
        &mut self,
        sql: &str,
        options: &PrepareOptions,
    ) -> Result<StatementHandle, DriverError> {
        self.recorder.record(Event::Prepare {
            sql: sql.to_string(),
            options: options.clone(),
        });
        self.fail(Failure::Prepare)?;

        let id = self.handle();
        self.statements.insert(id, StatementState::default());
        Ok(StatementHandle::new(id))
    }

    async fn set_fetch_size(
        &mut self,
        statement: StatementHandle,
        rows: usize,
    ) -> Result<(), DriverError> {
        self.recorder.record(Event::SetFetchSize {
            statement: statement.id(),
            rows,
        });
        self.fail(Failure::SetFetchSize)?;
        self.statement(statement).map(|_| ())
    }

    async fn apply_option(
        &mut self,
        statement: StatementHandle,
        option: StatementOption,
    ) -> Result<(), DriverError> {
        self.recorder.record(Event::Option {
            statement: statement.id(),
            option,
        });
        let state = self.statement(statement)?;
        if let StatementOption::MaxRows(rows) = option {
            state.max_rows = Some(rows);
        }
        Ok(())
    }

    async fn bind_parameter(
        &mut self,
        statement: StatementHandle,
        position: usize,
        value: SqlValue,
    ) -> Result<(), DriverError> {
        self.recorder.record(Event::Bind {
            statement: statement.id(),
            position,
            value,
        });
        self.fail(Failure::Bind)?;
        self.statement(statement).map(|_| ())
    }

    async fn add_batch(&mut self, statement: StatementHandle) -> Result<(), DriverError> {
        self.recorder.record(Event::AddBatch {
            statement: statement.id(),
        });
        self.statement(statement)?.batch_entries += 1;
        Ok(())
    }

    async fn execute_batch(&mut self, statement: StatementHandle) -> Result<Vec<i64>, DriverError> {
        self.recorder.record(Event::ExecuteBatch {
            statement: statement.id(),
        });
        self.fail(Failure::ExecuteBatch)?;

        let state = self.statement(statement)?;
        let entries = std::mem::take(&mut state.batch_entries);
        state.pending_keys = entries;
        Ok(vec![1; entries])
    }

    async fn execute_query(&mut self, statement: StatementHandle) -> Result<CursorHandle, DriverError> {
        self.recorder.record(Event::ExecuteQuery {
            statement: statement.id(),
        });
        self.fail(Failure::ExecuteQuery)?;

        let limit = self.statement(statement)?.max_rows;
        let mut rows = self.rows.clone();
        if let Some(limit) = limit.filter(|limit| *limit > 0) {
            rows.truncate(limit);
        }
        Ok(self.open_cursor(rows))
    }

    async fn execute_update(&mut self, statement: StatementHandle) -> Result<i64, DriverError> {
        self.recorder.record(Event::ExecuteUpdate {
            statement: statement.id(),
        });
        self.fail(Failure::ExecuteUpdate)?;

        let count = self.update_count;
        self.statement(statement)?.pending_keys = usize::try_from(count).unwrap_or(0);
        Ok(count)
    }

    async fn generated_keys(&mut self, statement: StatementHandle) -> Result<CursorHandle, DriverError> {
        self.recorder.record(Event::GeneratedKeys {
            statement: statement.id(),
        });
        self.fail(Failure::GeneratedKeys)?;

        let pending = std::mem::take(&mut self.statement(statement)?.pending_keys);
        let first = self.next_key;
        self.next_key += pending as i64;
        let keys = (first..self.next_key)
            .map(|key| vec![SqlValue::Integer(key)])
            .collect();
        Ok(self.open_cursor(keys))
    }

    async fn parameter_metadata(
        &mut self,
        statement: StatementHandle,
    ) -> Result<Vec<ParameterMetadata>, DriverError> {
        self.recorder.record(Event::ParameterMetadata {
            statement: statement.id(),
        });
        self.fail(Failure::Metadata)?;
        self.statement(statement)?;
        Ok(self.parameters.clone())
    }

    async fn column_metadata(
        &mut self,
        statement: StatementHandle,
    ) -> Result<Vec<ColumnMetadata>, DriverError> {
        self.recorder.record(Event::ColumnMetadata {
            statement: statement.id(),
        });
        self.fail(Failure::Metadata)?;
        self.statement(statement)?;
        Ok(self.columns.clone())
    }

    async fn close_statement(&mut self, statement: StatementHandle) -> Result<(), DriverError> {
        self.recorder.record(Event::CloseStatement {
            statement: statement.id(),
        });
        self.statements
            .remove(&statement.id())
            .ok_or(DriverError::StatementNotOpen(statement.id()))?;
        self.fail(Failure::CloseStatement)
    }

    async fn next_row(&mut self, cursor: CursorHandle) -> Result<bool, DriverError> {
        self.recorder.record(Event::NextRow { cursor: cursor.id() });

        let produced = self.produced;
        if self.failures.contains(&Failure::NextRowAfter(produced)) {
            return Err(DriverError::sql("08S01", "connection lost while fetching"));
        }

        let state = self
            .cursors
            .get_mut(&cursor.id())
            .ok_or(DriverError::CursorNotOpen(cursor.id()))?;
        let next = state.current.map_or(0, |current| current + 1);
        state.current = Some(next.min(state.rows.len()));
        if next < state.rows.len() {
            self.produced += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn read_column(&self, cursor: CursorHandle, position: usize) -> Result<SqlValue, DriverError> {
        let state = self
            .cursors
            .get(&cursor.id())
            .ok_or(DriverError::CursorNotOpen(cursor.id()))?;
        let row = state
            .current
            .and_then(|current| state.rows.get(current))
            .ok_or(DriverError::CursorNotOpen(cursor.id()))?;
        row.get(position)
            .cloned()
            .ok_or(DriverError::ColumnOutOfRange {
                position,
                width: row.len(),
            })
    }

    async fn close_cursor(&mut self, cursor: CursorHandle) -> Result<(), DriverError> {
        self.recorder.record(Event::CloseCursor { cursor: cursor.id() });
        self.cursors
            .remove(&cursor.id())
            .ok_or(DriverError::CursorNotOpen(cursor.id()))?;
        self.fail(Failure::CloseCursor)
    }
}

/// Session over `driver` with the default configuration.
pub fn session(driver: RecordingDriver) -> Session {
    Session::from_driver(driver)
}

/// Session over `driver` with `config`.
pub fn session_with(driver: RecordingDriver, config: SessionConfig) -> Session {
    Session::new(chunkquery::driver::shared(driver), config)
}

/// Install a test subscriber so `RUST_LOG` shows the library's tracing output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
