//! Sessions and their configuration.
//!
//! This module provides the [`Session`] callers run statements through, and
//! the [`SessionConfig`] defaults it applies.
//!
//! # Example
//!
//! ```no_run
//! # use chunkquery::connection::{Session, SessionConfig};
//! # use chunkquery::driver::SharedProtocol;
//! # use chunkquery::query::Configuration;
//! # use chunkquery::types::decoder;
//! # use std::str::FromStr;
//! # async fn example(protocol: SharedProtocol) -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::from_str("chunk_size=200&query_timeout=30")?;
//! let session = Session::new(protocol, config);
//!
//! let mut rows = session
//!     .stream(
//!         "SELECT name FROM users WHERE age > ?",
//!         Configuration::new().bind(0, 30i64),
//!         200,
//!         decoder::<String>(),
//!     )
//!     .await?;
//!
//! while let Some(name) = rows.try_next().await? {
//!     println!("{name}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod session;

pub use config::{SessionConfig, SessionConfigBuilder};
pub use session::Session;
