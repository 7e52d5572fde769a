//! Coercion rules between driver-native types and the types codecs expect.

use super::NativeType;

/// Broad category a native type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    /// BOOLEAN
    Boolean,
    /// SMALLINT, INTEGER, BIGINT
    Integral,
    /// DECIMAL
    Exact,
    /// REAL, DOUBLE
    Approximate,
    /// CHAR, VARCHAR
    Character,
    /// BINARY
    Binary,
    /// DATE, TIMESTAMP
    Temporal,
    /// Anything else; compatible only with itself
    Opaque,
}

/// Type mapper deciding which native types a codec may read or write.
pub struct TypeMapper;

impl TypeMapper {
    /// Classify a native type.
    pub fn family(native: &NativeType) -> TypeFamily {
        match native {
            NativeType::Boolean => TypeFamily::Boolean,
            NativeType::SmallInt | NativeType::Integer | NativeType::BigInt => TypeFamily::Integral,
            NativeType::Decimal => TypeFamily::Exact,
            NativeType::Real | NativeType::Double => TypeFamily::Approximate,
            NativeType::Char | NativeType::Varchar => TypeFamily::Character,
            NativeType::Binary => TypeFamily::Binary,
            NativeType::Date | NativeType::Timestamp => TypeFamily::Temporal,
            NativeType::Other(_) => TypeFamily::Opaque,
        }
    }

    /// Whether a column of type `column` can be read into a value expecting `expected`.
    ///
    /// Reads are permissive the way typical drivers are: numbers read as any
    /// numeric type, and every non-binary type reads as text.
    pub fn can_read(column: &NativeType, expected: &NativeType) -> bool {
        if column == expected {
            return true;
        }

        use TypeFamily::*;
        match (Self::family(column), Self::family(expected)) {
            (Opaque, _) | (_, Opaque) => false,
            (from, to) if from == to => true,
            (Integral | Exact, Approximate) => true,
            (Exact, Integral) | (Integral, Exact) => true,
            (Integral, Boolean) | (Boolean, Integral) => true,
            (Binary, Character) => false,
            (_, Character) => true,
            _ => false,
        }
    }

    /// Whether a value of type `value` can be bound to a parameter of type `parameter`.
    ///
    /// Writes only widen: an integer may be written to any numeric parameter,
    /// but a floating point value is never written to an integral one.
    pub fn can_write(value: &NativeType, parameter: &NativeType) -> bool {
        if value == parameter {
            return true;
        }

        use TypeFamily::*;
        match (Self::family(value), Self::family(parameter)) {
            (Opaque, _) | (_, Opaque) => false,
            (from, to) if from == to => true,
            (Integral, Exact | Approximate) => true,
            (Exact, Approximate) => true,
            (Character, Temporal) => true,
            _ => false,
        }
    }
}
