//! Chunked cursor reads.

use crate::driver::{CursorHandle, SharedProtocol};
use crate::error::StreamError;
use crate::types::{Row, RowDecoder};
use tracing::trace;

/// Upper bound on rows reserved up front; larger chunks grow as they fill.
const PREALLOCATED_ROWS: usize = 1024;

/// Rows decoded from one pull of a cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    /// Decoded rows in cursor order
    pub rows: Vec<T>,
    /// Whether the cursor ran out before the chunk was full
    pub exhausted: bool,
}

impl<T> Chunk<T> {
    /// Number of rows in the chunk.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check whether the chunk holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Pull up to `max_rows` rows from `cursor` and decode them.
///
/// The driver is locked once for the whole chunk. A chunk shorter than
/// `max_rows` means the cursor is exhausted. If any row fails to advance, read
/// or decode, the rows pulled so far are discarded and the error is returned.
pub(crate) async fn pull_chunk<T>(
    protocol: &SharedProtocol,
    cursor: CursorHandle,
    max_rows: usize,
    decoder: &dyn RowDecoder<T>,
) -> Result<Chunk<T>, StreamError> {
    let width = decoder.width();
    let mut rows = Vec::with_capacity(max_rows.min(PREALLOCATED_ROWS));
    let mut exhausted = false;

    let mut driver = protocol.lock().await;
    while rows.len() < max_rows {
        if !driver.next_row(cursor).await.map_err(StreamError::Pull)? {
            exhausted = true;
            break;
        }

        let values = (0..width)
            .map(|position| driver.read_column(cursor, position))
            .collect::<Result<Vec<_>, _>>()
            .map_err(StreamError::Pull)?;
        rows.push(decoder.decode(&Row::new(values))?);
    }
    drop(driver);

    trace!(cursor = cursor.id(), rows = rows.len(), exhausted, "Pulled chunk");
    Ok(Chunk { rows, exhausted })
}
