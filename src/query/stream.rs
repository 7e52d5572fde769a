//! Lazy, chunked row streams over a prepared statement.
//!
//! A [`RowStream`] owns one statement and one cursor. Rows are pulled from the
//! driver a chunk at a time, only when the consumer asks for a row and the
//! previous chunk has been handed out. However consumption ends (the cursor
//! runs dry, an error occurs, [`RowStream::close`] is called or the stream is
//! dropped), the cursor is closed before the statement, each exactly once.

use crate::driver::{CursorHandle, KeyColumns, PrepareOptions, SharedProtocol, StatementHandle};
use crate::error::StreamError;
use crate::query::chunk::pull_chunk;
use crate::query::configure::Configuration;
use crate::query::scope::{release_on_error, suppress};
use crate::query::statement::{self as lifecycle, Execution};
use crate::types::RowDecoder;
use futures_util::stream::{self, Stream};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Chunk size used when none is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Builder for row streams.
///
/// # Example
///
/// ```no_run
/// use chunkquery::driver::SharedProtocol;
/// use chunkquery::query::{Configuration, StreamBuilder};
/// use chunkquery::types::decoder;
///
/// # async fn example(protocol: SharedProtocol) -> Result<(), Box<dyn std::error::Error>> {
/// let mut rows = StreamBuilder::new(protocol, "SELECT id, name FROM users WHERE age > ?")
///     .configure(Configuration::new().bind(0, 30i64))
///     .chunk_size(100)
///     .open(decoder::<(i64, String)>())
///     .await?;
///
/// while let Some((id, name)) = rows.try_next().await? {
///     println!("{id}: {name}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct StreamBuilder {
    protocol: SharedProtocol,
    sql: String,
    options: PrepareOptions,
    configuration: Configuration,
    execution: Execution,
    chunk_size: usize,
    /// Bumped once the statement has been prepared
    prepared: Option<Arc<AtomicU64>>,
}

impl StreamBuilder {
    /// Start building a query stream for `sql`.
    pub fn new(protocol: SharedProtocol, sql: impl Into<String>) -> Self {
        Self {
            protocol,
            sql: sql.into(),
            options: PrepareOptions::default(),
            configuration: Configuration::new(),
            execution: Execution::Query,
            chunk_size: DEFAULT_CHUNK_SIZE,
            prepared: None,
        }
    }

    pub(crate) fn count_prepared(mut self, counter: Arc<AtomicU64>) -> Self {
        self.prepared = Some(counter);
        self
    }

    /// Options forwarded to the driver when preparing.
    pub fn options(mut self, options: PrepareOptions) -> Self {
        self.options = options;
        self
    }

    /// Columns whose generated values the update returns.
    pub fn key_columns(mut self, key_columns: KeyColumns) -> Self {
        self.options.key_columns = key_columns;
        self
    }

    /// Instructions applied after the fetch size and before execution.
    ///
    /// Appends to any instructions already configured.
    pub fn configure(mut self, configuration: Configuration) -> Self {
        self.configuration = self.configuration.then(configuration);
        self
    }

    /// How the configured statement becomes a cursor.
    pub fn execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    /// Rows per chunk, also used as the driver fetch size.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Prepare, configure and execute the statement, returning a stream over its cursor.
    ///
    /// A zero chunk size is rejected before anything is acquired. If a step
    /// after preparation fails, the statement is closed and no cursor exists.
    pub async fn open<T, D>(self, decoder: D) -> Result<RowStream<T>, StreamError>
    where
        D: RowDecoder<T> + 'static,
    {
        let StreamBuilder {
            protocol,
            sql,
            options,
            configuration,
            execution,
            chunk_size,
            prepared,
        } = self;

        if chunk_size == 0 {
            return Err(StreamError::InvalidChunkSize(chunk_size));
        }
        // Nothing may allocate between acquiring the cursor and owning it
        let decoder: Box<dyn RowDecoder<T>> = Box::new(decoder);

        let shared = &protocol;
        let statement = lifecycle::prepare(shared, &sql, &options).await?;
        if let Some(counter) = &prepared {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        let cursor = release_on_error(
            statement,
            |statement| async move {
                lifecycle::set_fetch_size(shared, statement, chunk_size).await?;
                configuration.apply(shared, statement).await?;
                lifecycle::execute(shared, statement, execution).await
            },
            |statement| lifecycle::close_statement(shared, statement),
        )
        .await?;

        Ok(RowStream {
            protocol,
            decoder,
            chunk_size,
            handles: Some(Handles { statement, cursor }),
            buffer: VecDeque::new(),
            exhausted: false,
            rows_yielded: 0,
            chunks_pulled: 0,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Handles {
    statement: StatementHandle,
    cursor: CursorHandle,
}

/// A lazy, single-pass sequence of decoded rows.
///
/// At most one chunk is buffered. Once the stream has returned `None` or an
/// error it stays finished and its driver resources are released.
pub struct RowStream<T> {
    protocol: SharedProtocol,
    decoder: Box<dyn RowDecoder<T>>,
    chunk_size: usize,
    /// `None` once the cursor and statement have been released
    handles: Option<Handles>,
    buffer: VecDeque<T>,
    exhausted: bool,
    rows_yielded: usize,
    chunks_pulled: usize,
}

impl<T> RowStream<T> {
    /// Next row, pulling a new chunk if the buffered one is used up.
    ///
    /// Returns `Ok(None)` once the cursor is exhausted, after releasing the
    /// cursor and statement. A pull or decode failure also releases both and
    /// ends the stream; rows returned earlier stay valid.
    pub async fn try_next(&mut self) -> Result<Option<T>, StreamError> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                self.rows_yielded += 1;
                return Ok(Some(row));
            }

            let Some(handles) = self.handles else {
                return Ok(None);
            };

            if self.exhausted {
                self.release().await?;
                return Ok(None);
            }

            match pull_chunk(
                &self.protocol,
                handles.cursor,
                self.chunk_size,
                self.decoder.as_ref(),
            )
            .await
            {
                Ok(chunk) => {
                    self.chunks_pulled += 1;
                    self.exhausted = chunk.exhausted;
                    self.buffer.extend(chunk.rows);
                }
                Err(primary) => {
                    let released = self.release().await;
                    return Err(suppress(primary, released));
                }
            }
        }
    }

    /// Stop consuming: close the cursor, then the statement.
    ///
    /// Buffered rows are discarded. Calling this on a finished stream does nothing.
    pub async fn close(&mut self) -> Result<(), StreamError> {
        self.release().await
    }

    /// Drain the remaining rows into a vector.
    pub async fn try_collect(mut self) -> Result<Vec<T>, StreamError> {
        let mut rows = Vec::new();
        while let Some(row) = self.try_next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// The only row of the stream.
    ///
    /// Fails with [`StreamError::UnexpectedEnd`] when there is no row and
    /// [`StreamError::UnexpectedContinuation`] when there is more than one.
    pub async fn unique(mut self) -> Result<T, StreamError> {
        match self.option_inner().await? {
            Some(row) => Ok(row),
            None => Err(StreamError::UnexpectedEnd),
        }
    }

    /// The only row of the stream, if any.
    ///
    /// Fails with [`StreamError::UnexpectedContinuation`] when there is more than one.
    pub async fn option(mut self) -> Result<Option<T>, StreamError> {
        self.option_inner().await
    }

    async fn option_inner(&mut self) -> Result<Option<T>, StreamError> {
        let Some(first) = self.try_next().await? else {
            return Ok(None);
        };
        match self.try_next().await? {
            None => Ok(Some(first)),
            Some(_) => {
                let released = self.release().await;
                Err(suppress(StreamError::UnexpectedContinuation, released))
            }
        }
    }

    /// Adapt into a [`Stream`] of rows.
    ///
    /// Dropping the adapter before it ends releases the cursor and statement
    /// the same way dropping the `RowStream` does.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, StreamError>> {
        stream::try_unfold(self, |mut rows| async move {
            Ok::<_, StreamError>(rows.try_next().await?.map(|row| (row, rows)))
        })
    }

    /// Rows handed to the consumer so far.
    pub fn rows_yielded(&self) -> usize {
        self.rows_yielded
    }

    /// Chunks pulled from the cursor so far.
    pub fn chunks_pulled(&self) -> usize {
        self.chunks_pulled
    }

    /// Rows per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Whether the cursor and statement have been released.
    pub fn is_closed(&self) -> bool {
        self.handles.is_none()
    }

    async fn release(&mut self) -> Result<(), StreamError> {
        let Some(Handles { statement, cursor }) = self.handles.take() else {
            return Ok(());
        };
        self.buffer.clear();

        debug!(
            statement = statement.id(),
            cursor = cursor.id(),
            rows = self.rows_yielded,
            chunks = self.chunks_pulled,
            "Releasing row stream"
        );
        lifecycle::close_both(&self.protocol, statement, cursor).await
    }
}

impl<T> Drop for RowStream<T> {
    fn drop(&mut self) {
        let Some(Handles { statement, cursor }) = self.handles.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(
                    statement = statement.id(),
                    cursor = cursor.id(),
                    "Row stream dropped while open, releasing in the background"
                );
                let protocol = Arc::clone(&self.protocol);
                runtime.spawn(async move {
                    if let Err(err) = lifecycle::close_both(&protocol, statement, cursor).await {
                        warn!(error = %err, "Background release of row stream failed");
                    }
                });
            }
            Err(_) => {
                warn!(
                    statement = statement.id(),
                    cursor = cursor.id(),
                    "Row stream dropped outside a runtime, the driver must reclaim its handles"
                );
            }
        }
    }
}
