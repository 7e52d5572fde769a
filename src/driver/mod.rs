//! Driver collaborator interface.
//!
//! The execution engine never talks to a database directly. It drives an
//! implementation of [`DriverProtocol`] through opaque statement and cursor
//! handles, sharing it between streams behind a mutex.
//!
//! # Architecture
//!
//! - `protocol` - Driver trait, handles and statement options
//! - `metadata` - Parameter and column descriptions used by analysis

pub mod metadata;
pub mod protocol;

pub use metadata::{ColumnMetadata, Nullability, ParameterMetadata, ParameterMode};
pub use protocol::{
    CursorHandle, DriverProtocol, FetchDirection, Holdability, KeyColumns, PrepareOptions,
    ResultSetConcurrency, ResultSetType, StatementHandle, StatementOption,
};

use std::sync::Arc;
use tokio::sync::Mutex;

/// Driver shared between a session and the streams it opens.
pub type SharedProtocol = Arc<Mutex<dyn DriverProtocol>>;

/// Wrap a driver for sharing.
pub fn shared<D: DriverProtocol + 'static>(driver: D) -> SharedProtocol {
    Arc::new(Mutex::new(driver))
}
