//! Native values exchanged with the driver.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Native type of a driver-side column or parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NativeType {
    /// BOOLEAN
    Boolean,
    /// SMALLINT
    SmallInt,
    /// INTEGER
    Integer,
    /// BIGINT
    BigInt,
    /// DECIMAL / NUMERIC
    Decimal,
    /// REAL
    Real,
    /// DOUBLE PRECISION
    Double,
    /// CHAR(n)
    Char,
    /// VARCHAR(n)
    Varchar,
    /// BINARY / VARBINARY / BLOB
    Binary,
    /// DATE
    Date,
    /// TIMESTAMP
    Timestamp,
    /// Any type this crate has no dedicated variant for
    Other(String),
}

impl NativeType {
    /// Parse a driver type name such as `VARCHAR` or `DOUBLE PRECISION`.
    pub fn from_type_name(name: &str) -> Self {
        match name.trim().to_uppercase().as_str() {
            "BOOLEAN" | "BOOL" | "BIT" => NativeType::Boolean,
            "SMALLINT" | "TINYINT" | "INT2" => NativeType::SmallInt,
            "INTEGER" | "INT" | "INT4" => NativeType::Integer,
            "BIGINT" | "INT8" => NativeType::BigInt,
            "DECIMAL" | "NUMERIC" => NativeType::Decimal,
            "REAL" | "FLOAT4" => NativeType::Real,
            "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" | "FLOAT8" => NativeType::Double,
            "CHAR" | "CHARACTER" | "NCHAR" => NativeType::Char,
            "VARCHAR" | "CHARACTER VARYING" | "NVARCHAR" | "TEXT" | "CLOB" => NativeType::Varchar,
            "BINARY" | "VARBINARY" | "BLOB" | "BYTEA" => NativeType::Binary,
            "DATE" => NativeType::Date,
            "TIMESTAMP" | "DATETIME" => NativeType::Timestamp,
            other => NativeType::Other(other.to_string()),
        }
    }

    /// Canonical SQL name of the type.
    pub fn type_name(&self) -> &str {
        match self {
            NativeType::Boolean => "BOOLEAN",
            NativeType::SmallInt => "SMALLINT",
            NativeType::Integer => "INTEGER",
            NativeType::BigInt => "BIGINT",
            NativeType::Decimal => "DECIMAL",
            NativeType::Real => "REAL",
            NativeType::Double => "DOUBLE",
            NativeType::Char => "CHAR",
            NativeType::Varchar => "VARCHAR",
            NativeType::Binary => "BINARY",
            NativeType::Date => "DATE",
            NativeType::Timestamp => "TIMESTAMP",
            NativeType::Other(name) => name,
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A single value read from a cursor or bound to a statement parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SqlValue {
    /// NULL value
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Double(f64),
    /// Character data
    Text(String),
    /// Binary data
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Check whether the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Short name of the value's runtime kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Boolean(_) => "BOOLEAN",
            SqlValue::Integer(_) => "INTEGER",
            SqlValue::Double(_) => "DOUBLE",
            SqlValue::Text(_) => "TEXT",
            SqlValue::Bytes(_) => "BYTES",
        }
    }

    /// Render the value as an SQL literal, for logs and reports.
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            SqlValue::Integer(i) => i.to_string(),
            SqlValue::Double(f) => f.to_string(),
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            SqlValue::Bytes(b) => format!("X'{}'", hex::encode(b)),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql_literal())
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Boolean(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Integer(i64::from(value))
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Double(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Bytes(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => SqlValue::Null,
        }
    }
}
