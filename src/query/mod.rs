//! Statement execution and row streaming.
//!
//! # Overview
//!
//! The query module is organized into:
//! - `scope` - Acquire/use/release bracket shared by every resource
//! - `statement` - Statement and cursor lifecycle, execution steps
//! - `configure` - Caller instructions applied before execution
//! - `chunk` - Bounded cursor reads
//! - `stream` - Lazy row streams and their builder
//! - `analysis` - Metadata introspection without execution
//!
//! # Example
//!
//! ```no_run
//! use chunkquery::driver::{KeyColumns, SharedProtocol};
//! use chunkquery::query::{Configuration, Execution, StreamBuilder};
//! use chunkquery::types::{decoder, encoder};
//!
//! # async fn example(protocol: SharedProtocol) -> Result<(), Box<dyn std::error::Error>> {
//! let users = vec![("alice".to_string(), 31i32), ("bob".to_string(), 27)];
//!
//! let keys = StreamBuilder::new(protocol, "INSERT INTO users (name, age) VALUES (?, ?)")
//!     .key_columns(KeyColumns::names(["id"]))
//!     .execution(Execution::batch(users, encoder::<(String, i32)>()))
//!     .chunk_size(64)
//!     .open(decoder::<i64>())
//!     .await?
//!     .try_collect()
//!     .await?;
//!
//! assert_eq!(keys.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod chunk;
pub mod configure;
pub mod scope;
pub mod statement;
pub mod stream;

pub use analysis::{
    prepare_query_analysis, prepare_query_analysis0, prepare_update_analysis,
    prepare_update_analysis0, AlignmentError, Analysis, ColumnMapping, ParameterMapping,
};
pub use chunk::Chunk;
pub use configure::{Configuration, Instruction};
pub use scope::{merge_release, release_on_error, suppress, with_resource};
pub use statement::{BatchRows, Execution};
pub use stream::{RowStream, StreamBuilder, DEFAULT_CHUNK_SIZE};
