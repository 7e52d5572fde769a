//! Error types for chunkquery.
//!
//! This module defines domain-specific error types organized by functional area:
//! failures reported by the driver, value conversion failures in both directions,
//! configuration parsing failures, and the execution errors surfaced by streams.

use std::fmt;
use thiserror::Error;

/// Errors reported by the database driver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// The statement handle does not refer to an open statement
    #[error("Statement {0} is not open")]
    StatementNotOpen(u64),

    /// The cursor handle does not refer to an open cursor
    #[error("Cursor {0} is not open")]
    CursorNotOpen(u64),

    /// Column position outside the cursor's row width
    #[error("Column {position} out of range (row has {width} columns)")]
    ColumnOutOfRange { position: usize, width: usize },

    /// Parameter position outside the statement's parameter count
    #[error("Parameter {position} out of range (statement has {count} parameters)")]
    ParameterOutOfRange { position: usize, count: usize },

    /// The database rejected the operation
    #[error("SQL error [{sql_state}]: {message}")]
    Sql { sql_state: String, message: String },

    /// The driver does not support the requested operation
    #[error("Unsupported driver operation: {0}")]
    Unsupported(String),

    /// Network or I/O failure between driver and database
    #[error("Driver I/O error: {0}")]
    Io(String),
}

impl DriverError {
    /// Convenience constructor for an SQL error with a state code.
    pub fn sql(sql_state: impl Into<String>, message: impl Into<String>) -> Self {
        DriverError::Sql {
            sql_state: sql_state.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while converting a driver value into a Rust value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The native value cannot represent the requested type
    #[error("Cannot decode column {position}: expected {expected}, found {actual}")]
    TypeMismatch {
        position: usize,
        expected: String,
        actual: String,
    },

    /// NULL read into a non-optional type
    #[error("Unexpected NULL in column {position}")]
    UnexpectedNull { position: usize },

    /// Integer does not fit into the target type
    #[error("Numeric overflow in column {position}: {value}")]
    NumericOverflow { position: usize, value: String },

    /// The decoder asked for a column the row does not have
    #[error("Column {position} out of range (row has {width} columns)")]
    ColumnOutOfRange { position: usize, width: usize },

    /// Failure raised by a custom decoder
    #[error("Decode failed: {0}")]
    Custom(String),
}

/// Errors raised while converting a Rust value into driver parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// Value not representable as a parameter of the driver
    #[error("Cannot encode parameter {position}: {message}")]
    Unrepresentable { position: usize, message: String },

    /// Encoder produced a different number of values than it declared
    #[error("Encoder produced {actual} values, expected {expected}")]
    WidthMismatch { expected: usize, actual: usize },

    /// Failure raised by a custom encoder
    #[error("Encode failed: {0}")]
    Custom(String),
}

/// Errors related to session configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration parameter '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Configuration string parsing error
    #[error("Failed to parse configuration string: {0}")]
    ParseError(String),
}

/// Driver-side resource managed by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Prepared statement
    Statement,
    /// Result cursor
    Cursor,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Statement => write!(f, "statement"),
            Resource::Cursor => write!(f, "cursor"),
        }
    }
}

/// Errors surfaced by statement execution and row streams.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Statement or cursor could not be created
    #[error("Failed to acquire {resource}: {source}")]
    Acquisition {
        resource: Resource,
        #[source]
        source: DriverError,
    },

    /// Binding or option-setting failed on an acquired statement
    #[error("Failed to configure statement: {0}")]
    Configuration(#[source] DriverError),

    /// A chunk fetch failed mid-stream
    #[error("Failed to pull rows: {0}")]
    Pull(#[source] DriverError),

    /// Metadata introspection failed
    #[error("Failed to read statement metadata: {0}")]
    Metadata(#[source] DriverError),

    /// A row could not be converted to the requested shape
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// An input record could not be converted into parameters
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Closing a statement or cursor failed
    #[error("Failed to release {resource}: {source}")]
    Release {
        resource: Resource,
        #[source]
        source: DriverError,
    },

    /// Chunk size must be at least one row
    #[error("Invalid chunk size {0}: must be at least 1")]
    InvalidChunkSize(usize),

    /// Exactly one row was required but the stream was empty
    #[error("Expected a row, but the result set was empty")]
    UnexpectedEnd,

    /// At most one row was required but more were available
    #[error("Expected at most one row, but more rows were available")]
    UnexpectedContinuation,

    /// A primary error with release failures recorded while unwinding from it
    #[error("{primary}{}", render_suppressed(.suppressed))]
    WithSuppressed {
        #[source]
        primary: Box<StreamError>,
        suppressed: Vec<StreamError>,
    },
}

fn render_suppressed(suppressed: &[StreamError]) -> String {
    let rendered: Vec<String> = suppressed.iter().map(|e| e.to_string()).collect();
    format!(" (suppressed: {})", rendered.join("; "))
}

impl StreamError {
    /// Attach a secondary error without replacing this one.
    pub fn with_suppressed(self, secondary: StreamError) -> Self {
        match self {
            StreamError::WithSuppressed {
                primary,
                mut suppressed,
            } => {
                suppressed.push(secondary);
                StreamError::WithSuppressed {
                    primary,
                    suppressed,
                }
            }
            primary => StreamError::WithSuppressed {
                primary: Box::new(primary),
                suppressed: vec![secondary],
            },
        }
    }

    /// The error that caused the failure, ignoring suppressed release errors.
    pub fn primary(&self) -> &StreamError {
        match self {
            StreamError::WithSuppressed { primary, .. } => primary.primary(),
            other => other,
        }
    }

    /// Release errors recorded while unwinding from the primary error.
    pub fn suppressed(&self) -> &[StreamError] {
        match self {
            StreamError::WithSuppressed { suppressed, .. } => suppressed,
            _ => &[],
        }
    }

    /// Classify the primary error.
    pub fn kind(&self) -> ErrorKind {
        match self.primary() {
            StreamError::Acquisition { .. } => ErrorKind::Acquisition,
            StreamError::Configuration(_) => ErrorKind::Configuration,
            StreamError::Pull(_) => ErrorKind::Pull,
            StreamError::Metadata(_) => ErrorKind::Metadata,
            StreamError::Decode(_) => ErrorKind::Decode,
            StreamError::Encode(_) => ErrorKind::Encode,
            StreamError::Release { .. } => ErrorKind::Release,
            StreamError::InvalidChunkSize(_) => ErrorKind::InvalidArgument,
            StreamError::UnexpectedEnd | StreamError::UnexpectedContinuation => {
                ErrorKind::Cardinality
            }
            StreamError::WithSuppressed { .. } => ErrorKind::Unknown,
        }
    }
}

/// Flat classification of stream errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown error
    Unknown,
    /// Statement or cursor acquisition
    Acquisition,
    /// Statement configuration
    Configuration,
    /// Chunk pull
    Pull,
    /// Metadata introspection
    Metadata,
    /// Row decoding
    Decode,
    /// Parameter encoding
    Encode,
    /// Resource release
    Release,
    /// Invalid caller argument
    InvalidArgument,
    /// Row count did not match the requested cardinality
    Cardinality,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Unknown => write!(f, "UNKNOWN"),
            ErrorKind::Acquisition => write!(f, "ACQUISITION"),
            ErrorKind::Configuration => write!(f, "CONFIGURATION"),
            ErrorKind::Pull => write!(f, "PULL"),
            ErrorKind::Metadata => write!(f, "METADATA"),
            ErrorKind::Decode => write!(f, "DECODE"),
            ErrorKind::Encode => write!(f, "ENCODE"),
            ErrorKind::Release => write!(f, "RELEASE"),
            ErrorKind::InvalidArgument => write!(f, "INVALID_ARGUMENT"),
            ErrorKind::Cardinality => write!(f, "CARDINALITY"),
        }
    }
}
