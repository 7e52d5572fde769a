//! Statement metadata reported by the driver.

use crate::types::NativeType;
use serde::Serialize;

/// Whether a column or parameter accepts NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Nullability {
    /// NULL is never produced or accepted
    NoNulls,
    /// NULL may occur
    Nullable,
    /// The driver cannot tell
    Unknown,
}

impl Nullability {
    /// Whether NULL may occur, treating unknown as nullable.
    pub fn may_be_null(&self) -> bool {
        !matches!(self, Nullability::NoNulls)
    }
}

/// Direction of a statement parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterMode {
    /// Input parameter
    In,
    /// Output parameter
    Out,
    /// Input and output parameter
    InOut,
    /// The driver cannot tell
    Unknown,
}

/// Driver description of one statement parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterMetadata {
    /// Native type the driver expects
    pub native_type: NativeType,
    /// NULL acceptance
    pub nullability: Nullability,
    /// Parameter direction
    pub mode: ParameterMode,
}

impl ParameterMetadata {
    /// An input parameter of the given type, nullability unknown.
    pub fn input(native_type: NativeType) -> Self {
        Self {
            native_type,
            nullability: Nullability::Unknown,
            mode: ParameterMode::In,
        }
    }
}

/// Driver description of one result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMetadata {
    /// Column label
    pub name: String,
    /// Native type of the column
    pub native_type: NativeType,
    /// Whether the column may contain NULL
    pub nullability: Nullability,
}

impl ColumnMetadata {
    /// Describe a column.
    pub fn new(name: impl Into<String>, native_type: NativeType, nullability: Nullability) -> Self {
        Self {
            name: name.into(),
            native_type,
            nullability,
        }
    }
}
