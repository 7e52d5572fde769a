//! Native values, type coercion rules and row/parameter codecs.

pub mod codec;
mod mapping;
mod value;

pub use codec::{
    decoder, encoder, ColumnType, FnDecoder, FnEncoder, FromRow, FromSql, ParamEncoder, Row,
    RowDecoder, ToRow, ToSql, TypedDecoder, TypedEncoder,
};
pub use mapping::{TypeFamily, TypeMapper};
pub use value::{NativeType, SqlValue};
