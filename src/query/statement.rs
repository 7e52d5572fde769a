//! Statement and cursor lifecycle.
//!
//! Thin wrappers over the shared driver that classify each failure by the
//! phase it happened in and log the open/close of every handle. Every call
//! locks the driver for its own duration only.

use crate::driver::{CursorHandle, PrepareOptions, SharedProtocol, StatementHandle};
use crate::error::{DriverError, EncodeError, Resource, StreamError};
use crate::query::scope::merge_release;
use crate::types::{ParamEncoder, SqlValue};
use std::fmt;
use tracing::debug;

/// Encoded parameter rows of a batch, produced one at a time.
pub type BatchRows = Box<dyn Iterator<Item = Result<Vec<SqlValue>, EncodeError>> + Send>;

/// How a configured statement is turned into a cursor.
pub enum Execution {
    /// Execute as a query and read its result set
    Query,
    /// Execute as an update and read the generated keys
    UpdateWithGeneratedKeys,
    /// Queue one batch entry per row, execute the batch and read the generated keys
    BatchWithGeneratedKeys(BatchRows),
}

impl Execution {
    /// Batch execution over `inputs`, encoding each record when it is bound.
    pub fn batch<A, I, E>(inputs: I, encoder: E) -> Self
    where
        A: 'static,
        I: IntoIterator<Item = A>,
        I::IntoIter: Send + 'static,
        E: ParamEncoder<A> + 'static,
    {
        let rows = inputs.into_iter().map(move |input| encoder.encode(&input));
        Execution::BatchWithGeneratedKeys(Box::new(rows))
    }
}

impl fmt::Debug for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Execution::Query => write!(f, "Query"),
            Execution::UpdateWithGeneratedKeys => write!(f, "UpdateWithGeneratedKeys"),
            Execution::BatchWithGeneratedKeys(_) => write!(f, "BatchWithGeneratedKeys(..)"),
        }
    }
}

fn cursor_acquisition(source: DriverError) -> StreamError {
    StreamError::Acquisition {
        resource: Resource::Cursor,
        source,
    }
}

/// Prepare a statement.
pub(crate) async fn prepare(
    protocol: &SharedProtocol,
    sql: &str,
    options: &PrepareOptions,
) -> Result<StatementHandle, StreamError> {
    let mut driver = protocol.lock().await;
    let statement = driver
        .prepare(sql, options)
        .await
        .map_err(|source| StreamError::Acquisition {
            resource: Resource::Statement,
            source,
        })?;

    debug!(statement = statement.id(), sql, "Prepared statement");
    Ok(statement)
}

/// Set the driver fetch size of a statement.
pub(crate) async fn set_fetch_size(
    protocol: &SharedProtocol,
    statement: StatementHandle,
    rows: usize,
) -> Result<(), StreamError> {
    let mut driver = protocol.lock().await;
    driver
        .set_fetch_size(statement, rows)
        .await
        .map_err(StreamError::Configuration)
}

/// Bind values to positions `0..values.len()`.
pub(crate) async fn bind_values(
    protocol: &SharedProtocol,
    statement: StatementHandle,
    values: Vec<SqlValue>,
) -> Result<(), StreamError> {
    let mut driver = protocol.lock().await;
    for (position, value) in values.into_iter().enumerate() {
        driver
            .bind_parameter(statement, position, value)
            .await
            .map_err(StreamError::Configuration)?;
    }
    Ok(())
}

/// Bind each row and queue it as a batch entry, returning the number of entries.
pub(crate) async fn add_batches<I>(
    protocol: &SharedProtocol,
    statement: StatementHandle,
    rows: I,
) -> Result<usize, StreamError>
where
    I: IntoIterator<Item = Result<Vec<SqlValue>, EncodeError>>,
{
    let mut entries = 0;
    for row in rows {
        bind_values(protocol, statement, row?).await?;
        protocol
            .lock()
            .await
            .add_batch(statement)
            .await
            .map_err(StreamError::Configuration)?;
        entries += 1;
    }

    debug!(statement = statement.id(), entries, "Queued batch entries");
    Ok(entries)
}

/// Execute a configured statement, returning the affected row count.
pub(crate) async fn execute_update(
    protocol: &SharedProtocol,
    statement: StatementHandle,
) -> Result<i64, StreamError> {
    let mut driver = protocol.lock().await;
    let count = driver
        .execute_update(statement)
        .await
        .map_err(cursor_acquisition)?;

    debug!(statement = statement.id(), count, "Executed update");
    Ok(count)
}

/// Execute all queued batch entries, returning one count per entry.
pub(crate) async fn execute_batch(
    protocol: &SharedProtocol,
    statement: StatementHandle,
) -> Result<Vec<i64>, StreamError> {
    let mut driver = protocol.lock().await;
    let counts = driver
        .execute_batch(statement)
        .await
        .map_err(cursor_acquisition)?;

    debug!(statement = statement.id(), entries = counts.len(), "Executed batch");
    Ok(counts)
}

/// Run an execution step against a configured statement and open its cursor.
pub(crate) async fn execute(
    protocol: &SharedProtocol,
    statement: StatementHandle,
    execution: Execution,
) -> Result<CursorHandle, StreamError> {
    let cursor = match execution {
        Execution::Query => {
            let mut driver = protocol.lock().await;
            driver
                .execute_query(statement)
                .await
                .map_err(cursor_acquisition)?
        }
        Execution::UpdateWithGeneratedKeys => {
            execute_update(protocol, statement).await?;
            generated_keys(protocol, statement).await?
        }
        Execution::BatchWithGeneratedKeys(rows) => {
            add_batches(protocol, statement, rows).await?;
            execute_batch(protocol, statement).await?;
            generated_keys(protocol, statement).await?
        }
    };

    debug!(
        statement = statement.id(),
        cursor = cursor.id(),
        "Opened cursor"
    );
    Ok(cursor)
}

async fn generated_keys(
    protocol: &SharedProtocol,
    statement: StatementHandle,
) -> Result<CursorHandle, StreamError> {
    let mut driver = protocol.lock().await;
    driver
        .generated_keys(statement)
        .await
        .map_err(cursor_acquisition)
}

/// Close a statement.
pub(crate) async fn close_statement(
    protocol: &SharedProtocol,
    statement: StatementHandle,
) -> Result<(), StreamError> {
    let mut driver = protocol.lock().await;
    driver
        .close_statement(statement)
        .await
        .map_err(|source| StreamError::Release {
            resource: Resource::Statement,
            source,
        })?;

    debug!(statement = statement.id(), "Closed statement");
    Ok(())
}

/// Close a cursor.
pub(crate) async fn close_cursor(
    protocol: &SharedProtocol,
    cursor: CursorHandle,
) -> Result<(), StreamError> {
    let mut driver = protocol.lock().await;
    driver
        .close_cursor(cursor)
        .await
        .map_err(|source| StreamError::Release {
            resource: Resource::Cursor,
            source,
        })?;

    debug!(cursor = cursor.id(), "Closed cursor");
    Ok(())
}

/// Close a cursor and then its statement.
///
/// The statement is closed even when the cursor close fails; a statement
/// close failure is then suppressed into the cursor's.
pub(crate) async fn close_both(
    protocol: &SharedProtocol,
    statement: StatementHandle,
    cursor: CursorHandle,
) -> Result<(), StreamError> {
    let cursor_closed = close_cursor(protocol, cursor).await;
    merge_release(cursor_closed, close_statement(protocol, statement).await)
}
