//! Driver protocol abstraction trait.
//!
//! This module defines the `DriverProtocol` trait that abstracts the database
//! driver the execution engine runs against. Statements and cursors are
//! addressed by opaque handles; the driver owns the underlying objects.

use crate::driver::metadata::{ColumnMetadata, ParameterMetadata};
use crate::error::DriverError;
use crate::types::SqlValue;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Handle to an open prepared statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementHandle(u64);

impl StatementHandle {
    /// Wrap a driver-assigned statement id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Driver-assigned id.
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StatementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stmt#{}", self.0)
    }
}

/// Handle to an open result cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorHandle(u64);

impl CursorHandle {
    /// Wrap a driver-assigned cursor id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Driver-assigned id.
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CursorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cursor#{}", self.0)
    }
}

/// Scrollability of the cursors a statement produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultSetType {
    /// Forward-only cursor
    #[default]
    ForwardOnly,
    /// Scrollable, insensitive to concurrent changes
    ScrollInsensitive,
    /// Scrollable, sensitive to concurrent changes
    ScrollSensitive,
}

/// Whether cursors may update the underlying rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultSetConcurrency {
    /// Read-only cursor
    #[default]
    ReadOnly,
    /// Updatable cursor
    Updatable,
}

/// Whether cursors survive a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holdability {
    /// Cursors stay open across commits
    HoldCursorsOverCommit,
    /// Cursors close at commit
    CloseCursorsAtCommit,
}

/// Columns whose generated values an update should return.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeyColumns {
    /// No generated keys requested
    #[default]
    None,
    /// Columns by name
    Names(Vec<String>),
    /// Columns by 0-based index
    Indices(Vec<usize>),
}

impl KeyColumns {
    /// Request generated keys by column name.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KeyColumns::Names(names.into_iter().map(Into::into).collect())
    }

    /// Request generated keys by column index.
    pub fn indices(indices: impl IntoIterator<Item = usize>) -> Self {
        KeyColumns::Indices(indices.into_iter().collect())
    }

    /// Check whether any key column was requested.
    pub fn is_none(&self) -> bool {
        matches!(self, KeyColumns::None)
    }
}

/// Options forwarded to the driver when preparing a statement.
///
/// These are not interpreted by the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrepareOptions {
    /// Cursor scrollability
    pub result_set_type: ResultSetType,
    /// Cursor concurrency
    pub concurrency: ResultSetConcurrency,
    /// Cursor holdability; `None` keeps the driver default
    pub holdability: Option<Holdability>,
    /// Generated-key columns
    pub key_columns: KeyColumns,
}

impl PrepareOptions {
    /// Set the result set type.
    pub fn with_result_set_type(mut self, result_set_type: ResultSetType) -> Self {
        self.result_set_type = result_set_type;
        self
    }

    /// Set the result set concurrency.
    pub fn with_concurrency(mut self, concurrency: ResultSetConcurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the cursor holdability.
    pub fn with_holdability(mut self, holdability: Holdability) -> Self {
        self.holdability = Some(holdability);
        self
    }

    /// Set the generated-key columns.
    pub fn with_key_columns(mut self, key_columns: KeyColumns) -> Self {
        self.key_columns = key_columns;
        self
    }
}

/// Direction hint for cursor traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDirection {
    /// Rows processed first to last
    Forward,
    /// Rows processed last to first
    Reverse,
    /// Order unknown
    Unknown,
}

/// Statement option a caller may set before execution.
///
/// Fetch size is deliberately absent: the engine sets it from the chunk size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementOption {
    /// Limit on the number of rows the cursor returns
    MaxRows(usize),
    /// Execution timeout
    QueryTimeout(Duration),
    /// Traversal direction hint
    FetchDirection(FetchDirection),
}

/// Driver protocol trait for statement execution.
///
/// Implementations are used by one logical thread of control at a time; the
/// engine serializes access through a shared mutex.
#[async_trait]
pub trait DriverProtocol: Send + Sync {
    /// Prepare a statement.
    ///
    /// # Errors
    ///
    /// Returns `DriverError` if the SQL is rejected or the driver cannot allocate a statement.
    async fn prepare(
        &mut self,
        sql: &str,
        options: &PrepareOptions,
    ) -> Result<StatementHandle, DriverError>;

    /// Set the number of rows the driver fetches per round-trip.
    async fn set_fetch_size(
        &mut self,
        statement: StatementHandle,
        rows: usize,
    ) -> Result<(), DriverError>;

    /// Apply a caller-supplied statement option.
    async fn apply_option(
        &mut self,
        statement: StatementHandle,
        option: StatementOption,
    ) -> Result<(), DriverError>;

    /// Bind a value to the parameter at a 0-based position.
    async fn bind_parameter(
        &mut self,
        statement: StatementHandle,
        position: usize,
        value: SqlValue,
    ) -> Result<(), DriverError>;

    /// Queue the currently bound parameters as one batch entry.
    async fn add_batch(&mut self, statement: StatementHandle) -> Result<(), DriverError>;

    /// Execute all queued batch entries, returning one update count per entry.
    async fn execute_batch(&mut self, statement: StatementHandle) -> Result<Vec<i64>, DriverError>;

    /// Execute a query and open a cursor over its result.
    async fn execute_query(
        &mut self,
        statement: StatementHandle,
    ) -> Result<CursorHandle, DriverError>;

    /// Execute an update and return the affected row count.
    async fn execute_update(&mut self, statement: StatementHandle) -> Result<i64, DriverError>;

    /// Open a cursor over the keys generated by the last execution.
    async fn generated_keys(
        &mut self,
        statement: StatementHandle,
    ) -> Result<CursorHandle, DriverError>;

    /// Describe the statement's parameters without executing it.
    async fn parameter_metadata(
        &mut self,
        statement: StatementHandle,
    ) -> Result<Vec<ParameterMetadata>, DriverError>;

    /// Describe the statement's result columns without executing it.
    async fn column_metadata(
        &mut self,
        statement: StatementHandle,
    ) -> Result<Vec<ColumnMetadata>, DriverError>;

    /// Close a statement.
    async fn close_statement(&mut self, statement: StatementHandle) -> Result<(), DriverError>;

    /// Advance the cursor; `false` once no rows remain.
    async fn next_row(&mut self, cursor: CursorHandle) -> Result<bool, DriverError>;

    /// Read the column at a 0-based position of the current row.
    fn read_column(&self, cursor: CursorHandle, position: usize) -> Result<SqlValue, DriverError>;

    /// Close a cursor.
    async fn close_cursor(&mut self, cursor: CursorHandle) -> Result<(), DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_display() {
        assert_eq!(StatementHandle::new(7).to_string(), "stmt#7");
        assert_eq!(CursorHandle::new(3).to_string(), "cursor#3");
        assert_eq!(CursorHandle::new(3).id(), 3);
    }

    #[test]
    fn test_prepare_options_default() {
        let options = PrepareOptions::default();
        assert_eq!(options.result_set_type, ResultSetType::ForwardOnly);
        assert_eq!(options.concurrency, ResultSetConcurrency::ReadOnly);
        assert!(options.holdability.is_none());
        assert!(options.key_columns.is_none());
    }

    #[test]
    fn test_prepare_options_builder() {
        let options = PrepareOptions::default()
            .with_result_set_type(ResultSetType::ScrollInsensitive)
            .with_holdability(Holdability::CloseCursorsAtCommit)
            .with_key_columns(KeyColumns::names(["id"]));

        assert_eq!(options.result_set_type, ResultSetType::ScrollInsensitive);
        assert_eq!(options.holdability, Some(Holdability::CloseCursorsAtCommit));
        assert_eq!(options.key_columns, KeyColumns::Names(vec!["id".to_string()]));
    }

    #[test]
    fn test_key_columns_by_index() {
        assert_eq!(KeyColumns::indices([0, 2]), KeyColumns::Indices(vec![0, 2]));
        assert!(!KeyColumns::indices([1]).is_none());
    }
}
