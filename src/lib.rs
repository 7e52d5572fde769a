//! # chunkquery
//!
//! Chunked, lazily-pulled row streams over a prepared-statement driver.
//!
//! A query is prepared, configured and executed only when its stream is
//! opened. Rows are then read from the cursor in bounded chunks as the
//! consumer asks for them, and the cursor and statement are released exactly
//! once however consumption ends: exhaustion, an explicit close, an error, or
//! the stream being dropped.
//!
//! The same pipeline runs updates that return generated keys, batched
//! updates, and metadata-only analysis of a statement against the codecs the
//! caller intends to use with it.
//!
//! ## Example
//!
//! ```no_run
//! # use chunkquery::*;
//! # async fn example(driver: impl driver::DriverProtocol + 'static) -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::from_driver(driver);
//!
//! // Nothing runs until the stream is opened
//! let mut rows = session
//!     .statement("SELECT id, name FROM users WHERE active = ?")
//!     .configure(Configuration::new().bind(0, true))
//!     .chunk_size(100)
//!     .open(types::decoder::<(i64, String)>())
//!     .await?;
//!
//! while let Some((id, name)) = rows.try_next().await? {
//!     println!("{id}: {name}");
//! }
//!
//! // Release the cursor and statement now rather than on drop
//! rows.close().await?;
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod connection;
pub mod driver;
pub mod error;
pub mod query;
pub mod types;

// Re-export public API
pub use connection::{Session, SessionConfig};
pub use driver::{DriverProtocol, SharedProtocol};
pub use error::{DriverError, ErrorKind, StreamError};
pub use query::{Analysis, Configuration, Execution, RowStream, StreamBuilder};
pub use types::{NativeType, SqlValue, TypeMapper};
