//! Row decoding and parameter encoding.
//!
//! Decoders and encoders are explicit objects handed to stream construction.
//! [`TypedDecoder`] and [`TypedEncoder`] derive their behavior from the
//! [`FromRow`] / [`ToRow`] shape of the target type (scalars, `Option`s and
//! tuples of those); [`FnDecoder`] and [`FnEncoder`] wrap closures for shapes
//! that need custom logic.

use crate::error::{DecodeError, EncodeError};
use crate::types::{NativeType, SqlValue};
use serde::Serialize;
use std::marker::PhantomData;

/// One row read from a cursor, holding the columns a decoder asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<SqlValue>,
}

impl Row {
    /// Create a row from its column values.
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    /// Value at a 0-based column position.
    pub fn get(&self, position: usize) -> Result<&SqlValue, DecodeError> {
        self.values
            .get(position)
            .ok_or(DecodeError::ColumnOutOfRange {
                position,
                width: self.values.len(),
            })
    }

    /// Number of columns in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All column values in order.
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

/// Column type a decoder expects to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnType {
    /// Preferred native type
    pub native: NativeType,
    /// Whether the decoder accepts NULL
    pub nullable: bool,
}

impl ColumnType {
    /// A column that must not be NULL.
    pub fn required(native: NativeType) -> Self {
        Self {
            native,
            nullable: false,
        }
    }

    /// A column that may be NULL.
    pub fn optional(native: NativeType) -> Self {
        Self {
            native,
            nullable: true,
        }
    }
}

/// Conversion from a single driver value.
pub trait FromSql: Sized {
    /// Native type this conversion reads best from.
    fn native_type() -> NativeType;

    /// Whether NULL is a valid input.
    fn nullable() -> bool {
        false
    }

    /// Convert the value found at `position`.
    fn from_sql(value: &SqlValue, position: usize) -> Result<Self, DecodeError>;
}

/// Conversion into a single driver value.
pub trait ToSql {
    /// Native type this conversion writes.
    fn native_type() -> NativeType;

    /// Convert the value destined for `position`.
    fn to_sql(&self, position: usize) -> Result<SqlValue, EncodeError>;
}

fn mismatch(position: usize, expected: &NativeType, value: &SqlValue) -> DecodeError {
    match value {
        SqlValue::Null => DecodeError::UnexpectedNull { position },
        other => DecodeError::TypeMismatch {
            position,
            expected: expected.to_string(),
            actual: other.kind_name().to_string(),
        },
    }
}

impl FromSql for bool {
    fn native_type() -> NativeType {
        NativeType::Boolean
    }

    fn from_sql(value: &SqlValue, position: usize) -> Result<Self, DecodeError> {
        match value {
            SqlValue::Boolean(b) => Ok(*b),
            SqlValue::Integer(i) => Ok(*i != 0),
            other => Err(mismatch(position, &<Self as FromSql>::native_type(), other)),
        }
    }
}

impl FromSql for i32 {
    fn native_type() -> NativeType {
        NativeType::Integer
    }

    fn from_sql(value: &SqlValue, position: usize) -> Result<Self, DecodeError> {
        match value {
            SqlValue::Integer(i) => i32::try_from(*i).map_err(|_| DecodeError::NumericOverflow {
                position,
                value: i.to_string(),
            }),
            other => Err(mismatch(position, &<Self as FromSql>::native_type(), other)),
        }
    }
}

impl FromSql for i64 {
    fn native_type() -> NativeType {
        NativeType::BigInt
    }

    fn from_sql(value: &SqlValue, position: usize) -> Result<Self, DecodeError> {
        match value {
            SqlValue::Integer(i) => Ok(*i),
            other => Err(mismatch(position, &<Self as FromSql>::native_type(), other)),
        }
    }
}

impl FromSql for f64 {
    fn native_type() -> NativeType {
        NativeType::Double
    }

    fn from_sql(value: &SqlValue, position: usize) -> Result<Self, DecodeError> {
        match value {
            SqlValue::Double(f) => Ok(*f),
            SqlValue::Integer(i) => Ok(*i as f64),
            other => Err(mismatch(position, &<Self as FromSql>::native_type(), other)),
        }
    }
}

impl FromSql for String {
    fn native_type() -> NativeType {
        NativeType::Varchar
    }

    fn from_sql(value: &SqlValue, position: usize) -> Result<Self, DecodeError> {
        match value {
            SqlValue::Text(s) => Ok(s.clone()),
            SqlValue::Null | SqlValue::Bytes(_) => {
                Err(mismatch(position, &<Self as FromSql>::native_type(), value))
            }
            other => Ok(other.to_sql_literal()),
        }
    }
}

impl FromSql for Vec<u8> {
    fn native_type() -> NativeType {
        NativeType::Binary
    }

    fn from_sql(value: &SqlValue, position: usize) -> Result<Self, DecodeError> {
        match value {
            SqlValue::Bytes(b) => Ok(b.clone()),
            other => Err(mismatch(position, &<Self as FromSql>::native_type(), other)),
        }
    }
}

impl<T: FromSql> FromSql for Option<T> {
    fn native_type() -> NativeType {
        T::native_type()
    }

    fn nullable() -> bool {
        true
    }

    fn from_sql(value: &SqlValue, position: usize) -> Result<Self, DecodeError> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql(other, position).map(Some),
        }
    }
}

impl ToSql for bool {
    fn native_type() -> NativeType {
        NativeType::Boolean
    }

    fn to_sql(&self, _position: usize) -> Result<SqlValue, EncodeError> {
        Ok(SqlValue::Boolean(*self))
    }
}

impl ToSql for i32 {
    fn native_type() -> NativeType {
        NativeType::Integer
    }

    fn to_sql(&self, _position: usize) -> Result<SqlValue, EncodeError> {
        Ok(SqlValue::Integer(i64::from(*self)))
    }
}

impl ToSql for i64 {
    fn native_type() -> NativeType {
        NativeType::BigInt
    }

    fn to_sql(&self, _position: usize) -> Result<SqlValue, EncodeError> {
        Ok(SqlValue::Integer(*self))
    }
}

impl ToSql for f64 {
    fn native_type() -> NativeType {
        NativeType::Double
    }

    fn to_sql(&self, position: usize) -> Result<SqlValue, EncodeError> {
        if self.is_finite() {
            Ok(SqlValue::Double(*self))
        } else {
            Err(EncodeError::Unrepresentable {
                position,
                message: "NaN and Infinity are not supported".to_string(),
            })
        }
    }
}

impl ToSql for String {
    fn native_type() -> NativeType {
        NativeType::Varchar
    }

    fn to_sql(&self, _position: usize) -> Result<SqlValue, EncodeError> {
        Ok(SqlValue::Text(self.clone()))
    }
}

impl ToSql for Vec<u8> {
    fn native_type() -> NativeType {
        NativeType::Binary
    }

    fn to_sql(&self, _position: usize) -> Result<SqlValue, EncodeError> {
        Ok(SqlValue::Bytes(self.clone()))
    }
}

impl<T: ToSql> ToSql for Option<T> {
    fn native_type() -> NativeType {
        T::native_type()
    }

    fn to_sql(&self, position: usize) -> Result<SqlValue, EncodeError> {
        match self {
            Some(inner) => inner.to_sql(position),
            None => Ok(SqlValue::Null),
        }
    }
}

/// A record shape that spans one or more consecutive columns.
pub trait FromRow: Sized {
    /// Number of columns consumed.
    fn width() -> usize;

    /// Expected type of each consumed column.
    fn column_types() -> Vec<ColumnType>;

    /// Decode starting at column `offset`.
    fn from_row(row: &Row, offset: usize) -> Result<Self, DecodeError>;
}

/// A record shape that spans one or more consecutive parameters.
pub trait ToRow {
    /// Number of parameters produced.
    fn width() -> usize;

    /// Native type of each produced parameter.
    fn parameter_types() -> Vec<NativeType>;

    /// Encode, numbering parameters from `offset`.
    fn to_row(&self, offset: usize) -> Result<Vec<SqlValue>, EncodeError>;
}

macro_rules! scalar_shapes {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FromRow for $ty {
                fn width() -> usize {
                    1
                }

                fn column_types() -> Vec<ColumnType> {
                    vec![ColumnType {
                        native: <$ty as FromSql>::native_type(),
                        nullable: <$ty as FromSql>::nullable(),
                    }]
                }

                fn from_row(row: &Row, offset: usize) -> Result<Self, DecodeError> {
                    <$ty as FromSql>::from_sql(row.get(offset)?, offset)
                }
            }

            impl ToRow for $ty {
                fn width() -> usize {
                    1
                }

                fn parameter_types() -> Vec<NativeType> {
                    vec![<$ty as ToSql>::native_type()]
                }

                fn to_row(&self, offset: usize) -> Result<Vec<SqlValue>, EncodeError> {
                    Ok(vec![<$ty as ToSql>::to_sql(self, offset)?])
                }
            }
        )+
    };
}

scalar_shapes!(bool, i32, i64, f64, String, Vec<u8>);

impl<T: FromSql> FromRow for Option<T> {
    fn width() -> usize {
        1
    }

    fn column_types() -> Vec<ColumnType> {
        vec![ColumnType::optional(T::native_type())]
    }

    fn from_row(row: &Row, offset: usize) -> Result<Self, DecodeError> {
        <Option<T> as FromSql>::from_sql(row.get(offset)?, offset)
    }
}

impl<T: ToSql> ToRow for Option<T> {
    fn width() -> usize {
        1
    }

    fn parameter_types() -> Vec<NativeType> {
        vec![T::native_type()]
    }

    fn to_row(&self, offset: usize) -> Result<Vec<SqlValue>, EncodeError> {
        Ok(vec![<Option<T> as ToSql>::to_sql(self, offset)?])
    }
}

macro_rules! tuple_shapes {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: FromRow),+> FromRow for ($($name,)+) {
            fn width() -> usize {
                0 $(+ $name::width())+
            }

            fn column_types() -> Vec<ColumnType> {
                let mut types = Vec::with_capacity(Self::width());
                $(types.extend($name::column_types());)+
                types
            }

            #[allow(unused_assignments)]
            fn from_row(row: &Row, offset: usize) -> Result<Self, DecodeError> {
                let mut position = offset;
                Ok(($(
                    {
                        let value = $name::from_row(row, position)?;
                        position += $name::width();
                        value
                    },
                )+))
            }
        }

        impl<$($name: ToRow),+> ToRow for ($($name,)+) {
            fn width() -> usize {
                0 $(+ $name::width())+
            }

            fn parameter_types() -> Vec<NativeType> {
                let mut types = Vec::with_capacity(Self::width());
                $(types.extend($name::parameter_types());)+
                types
            }

            fn to_row(&self, offset: usize) -> Result<Vec<SqlValue>, EncodeError> {
                let mut values = Vec::with_capacity(Self::width());
                $(
                    let encoded = self.$idx.to_row(offset + values.len())?;
                    values.extend(encoded);
                )+
                Ok(values)
            }
        }
    };
}

tuple_shapes!(A: 0);
tuple_shapes!(A: 0, B: 1);
tuple_shapes!(A: 0, B: 1, C: 2);
tuple_shapes!(A: 0, B: 1, C: 2, D: 3);
tuple_shapes!(A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_shapes!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

/// Turns a cursor row into a typed record.
pub trait RowDecoder<T>: Send + Sync {
    /// Number of columns read per row, starting at position 0.
    fn width(&self) -> usize;

    /// Expected type of each column, for analysis.
    fn column_types(&self) -> Vec<ColumnType>;

    /// Decode one row.
    fn decode(&self, row: &Row) -> Result<T, DecodeError>;
}

/// Turns a typed record into statement parameters.
pub trait ParamEncoder<A>: Send + Sync {
    /// Number of parameters produced per record.
    fn width(&self) -> usize;

    /// Native type of each parameter, for analysis.
    fn parameter_types(&self) -> Vec<NativeType>;

    /// Encode one record into parameter values for positions `0..width`.
    fn encode(&self, value: &A) -> Result<Vec<SqlValue>, EncodeError>;
}

/// Decoder driven by the record's [`FromRow`] shape.
pub struct TypedDecoder<T> {
    _shape: PhantomData<fn() -> T>,
}

impl<T> TypedDecoder<T> {
    /// Create a decoder for `T`.
    pub fn new() -> Self {
        Self {
            _shape: PhantomData,
        }
    }
}

impl<T> Default for TypedDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FromRow> RowDecoder<T> for TypedDecoder<T> {
    fn width(&self) -> usize {
        T::width()
    }

    fn column_types(&self) -> Vec<ColumnType> {
        T::column_types()
    }

    fn decode(&self, row: &Row) -> Result<T, DecodeError> {
        T::from_row(row, 0)
    }
}

/// Encoder driven by the record's [`ToRow`] shape.
pub struct TypedEncoder<A> {
    _shape: PhantomData<fn(&A)>,
}

impl<A> TypedEncoder<A> {
    /// Create an encoder for `A`.
    pub fn new() -> Self {
        Self {
            _shape: PhantomData,
        }
    }
}

impl<A> Default for TypedEncoder<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ToRow> ParamEncoder<A> for TypedEncoder<A> {
    fn width(&self) -> usize {
        A::width()
    }

    fn parameter_types(&self) -> Vec<NativeType> {
        A::parameter_types()
    }

    fn encode(&self, value: &A) -> Result<Vec<SqlValue>, EncodeError> {
        value.to_row(0)
    }
}

/// Decoder backed by a closure.
pub struct FnDecoder<F> {
    column_types: Vec<ColumnType>,
    decode: F,
}

impl<F> FnDecoder<F> {
    /// Create a decoder reading `column_types.len()` columns per row.
    pub fn new(column_types: Vec<ColumnType>, decode: F) -> Self {
        Self {
            column_types,
            decode,
        }
    }
}

impl<T, F> RowDecoder<T> for FnDecoder<F>
where
    F: Fn(&Row) -> Result<T, DecodeError> + Send + Sync,
{
    fn width(&self) -> usize {
        self.column_types.len()
    }

    fn column_types(&self) -> Vec<ColumnType> {
        self.column_types.clone()
    }

    fn decode(&self, row: &Row) -> Result<T, DecodeError> {
        (self.decode)(row)
    }
}

/// Encoder backed by a closure.
pub struct FnEncoder<F> {
    parameter_types: Vec<NativeType>,
    encode: F,
}

impl<F> FnEncoder<F> {
    /// Create an encoder producing `parameter_types.len()` values per record.
    pub fn new(parameter_types: Vec<NativeType>, encode: F) -> Self {
        Self {
            parameter_types,
            encode,
        }
    }
}

impl<A, F> ParamEncoder<A> for FnEncoder<F>
where
    F: Fn(&A) -> Result<Vec<SqlValue>, EncodeError> + Send + Sync,
{
    fn width(&self) -> usize {
        self.parameter_types.len()
    }

    fn parameter_types(&self) -> Vec<NativeType> {
        self.parameter_types.clone()
    }

    fn encode(&self, value: &A) -> Result<Vec<SqlValue>, EncodeError> {
        let values = (self.encode)(value)?;
        if values.len() != self.parameter_types.len() {
            return Err(EncodeError::WidthMismatch {
                expected: self.parameter_types.len(),
                actual: values.len(),
            });
        }
        Ok(values)
    }
}

/// Decoder for the record shape `T`.
pub fn decoder<T: FromRow>() -> TypedDecoder<T> {
    TypedDecoder::new()
}

/// Encoder for the record shape `A`.
pub fn encoder<A: ToRow>() -> TypedEncoder<A> {
    TypedEncoder::new()
}
