//! Statement analysis without execution.
//!
//! An analysis prepares a statement only to ask the driver how it sees the
//! statement's parameters and result columns, pairs that with what the
//! caller's encoder and decoder expect, and releases the statement again.
//! Nothing is ever executed.

use crate::driver::{
    ColumnMetadata, Nullability, ParameterMetadata, PrepareOptions, SharedProtocol,
    StatementHandle,
};
use crate::error::StreamError;
use crate::query::scope::with_resource;
use crate::query::statement as lifecycle;
use crate::types::{ColumnType, NativeType, ParamEncoder, RowDecoder, TypeMapper};
use serde::Serialize;
use std::fmt::Write as _;
use thiserror::Error;

/// Driver parameter paired with the type the encoder writes at the same position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterMapping {
    /// 0-based parameter position
    pub position: usize,
    /// What the driver reports, if it reports this position
    pub metadata: Option<ParameterMetadata>,
    /// What the encoder writes, if it writes this position
    pub expected: Option<NativeType>,
}

/// Driver column paired with the type the decoder reads at the same position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMapping {
    /// 0-based column position
    pub position: usize,
    /// What the driver reports, if it reports this position
    pub metadata: Option<ColumnMetadata>,
    /// What the decoder reads, if it reads this position
    pub expected: Option<ColumnType>,
}

/// A mismatch between the driver's view of a statement and the caller's codecs.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlignmentError {
    /// Parameter known to only one side
    #[error("Parameter {position}: {detail}")]
    ParameterMisalignment { position: usize, detail: String },

    /// Encoder writes a type the parameter does not accept
    #[error("Parameter {position}: {written} cannot be written to {parameter}")]
    ParameterTypeError {
        position: usize,
        written: NativeType,
        parameter: NativeType,
    },

    /// Column known to only one side
    #[error("Column {position}: {detail}")]
    ColumnMisalignment { position: usize, detail: String },

    /// Decoder reads a type the column cannot provide
    #[error("Column {position} ({name}): {column} cannot be read as {expected}")]
    ColumnTypeError {
        position: usize,
        name: String,
        column: NativeType,
        expected: NativeType,
    },

    /// Nullable column decoded into a non-optional type
    #[error("Column {position} ({name}) is nullable but decoded as non-optional {expected}")]
    NullabilityMisalignment {
        position: usize,
        name: String,
        expected: NativeType,
    },
}

/// Driver and codec views of one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    /// Analyzed SQL text
    pub sql: String,
    /// One entry per parameter position known to either side
    pub parameter_mappings: Vec<ParameterMapping>,
    /// One entry per column position known to either side
    pub column_mappings: Vec<ColumnMapping>,
}

impl Analysis {
    fn new(
        sql: &str,
        parameters: Vec<ParameterMetadata>,
        written: Vec<NativeType>,
        columns: Vec<ColumnMetadata>,
        read: Vec<ColumnType>,
    ) -> Self {
        let parameter_mappings = (0..parameters.len().max(written.len()))
            .map(|position| ParameterMapping {
                position,
                metadata: parameters.get(position).cloned(),
                expected: written.get(position).cloned(),
            })
            .collect();
        let column_mappings = (0..columns.len().max(read.len()))
            .map(|position| ColumnMapping {
                position,
                metadata: columns.get(position).cloned(),
                expected: read.get(position).cloned(),
            })
            .collect();

        Self {
            sql: sql.to_string(),
            parameter_mappings,
            column_mappings,
        }
    }

    /// Every mismatch between the driver and the codecs, parameters first.
    pub fn alignment_errors(&self) -> Vec<AlignmentError> {
        let mut errors = Vec::new();

        for mapping in &self.parameter_mappings {
            let position = mapping.position;
            match (&mapping.metadata, &mapping.expected) {
                (Some(metadata), Some(written)) => {
                    if !TypeMapper::can_write(written, &metadata.native_type) {
                        errors.push(AlignmentError::ParameterTypeError {
                            position,
                            written: written.clone(),
                            parameter: metadata.native_type.clone(),
                        });
                    }
                }
                (Some(metadata), None) => errors.push(AlignmentError::ParameterMisalignment {
                    position,
                    detail: format!("{} parameter is never written", metadata.native_type),
                }),
                (None, Some(written)) => errors.push(AlignmentError::ParameterMisalignment {
                    position,
                    detail: format!("{} is written but the statement has no such parameter", written),
                }),
                (None, None) => {}
            }
        }

        for mapping in &self.column_mappings {
            let position = mapping.position;
            match (&mapping.metadata, &mapping.expected) {
                (Some(column), Some(expected)) => {
                    if !TypeMapper::can_read(&column.native_type, &expected.native) {
                        errors.push(AlignmentError::ColumnTypeError {
                            position,
                            name: column.name.clone(),
                            column: column.native_type.clone(),
                            expected: expected.native.clone(),
                        });
                    } else if column.nullability == Nullability::Nullable && !expected.nullable {
                        errors.push(AlignmentError::NullabilityMisalignment {
                            position,
                            name: column.name.clone(),
                            expected: expected.native.clone(),
                        });
                    }
                }
                (Some(column), None) => errors.push(AlignmentError::ColumnMisalignment {
                    position,
                    detail: format!("{} column {} is never read", column.native_type, column.name),
                }),
                (None, Some(expected)) => errors.push(AlignmentError::ColumnMisalignment {
                    position,
                    detail: format!("{} is read but the statement has no such column", expected.native),
                }),
                (None, None) => {}
            }
        }

        errors
    }

    /// Whether the codecs match the statement exactly.
    pub fn is_aligned(&self) -> bool {
        self.alignment_errors().is_empty()
    }

    /// Human-readable report of the mappings and any mismatches.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.sql);

        for mapping in &self.parameter_mappings {
            let _ = writeln!(
                out,
                "  param {:>3}  {:<12} <- {}",
                mapping.position,
                mapping
                    .metadata
                    .as_ref()
                    .map_or("-".to_string(), |m| m.native_type.to_string()),
                mapping
                    .expected
                    .as_ref()
                    .map_or("-".to_string(), |t| t.to_string()),
            );
        }
        for mapping in &self.column_mappings {
            let _ = writeln!(
                out,
                "  column {:>2}  {:<12} -> {}",
                mapping.position,
                mapping
                    .metadata
                    .as_ref()
                    .map_or("-".to_string(), |m| format!("{} {}", m.name, m.native_type)),
                mapping.expected.as_ref().map_or("-".to_string(), |t| {
                    if t.nullable {
                        format!("{}?", t.native)
                    } else {
                        t.native.to_string()
                    }
                }),
            );
        }

        let errors = self.alignment_errors();
        if errors.is_empty() {
            out.push_str("  aligned\n");
        } else {
            for error in errors {
                let _ = writeln!(out, "  error: {}", error);
            }
        }
        out
    }

    /// Serialize the analysis for reporting, including its alignment verdict and errors.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let alignment_errors = self.alignment_errors();
        serde_json::to_string_pretty(&Report {
            analysis: self,
            aligned: alignment_errors.is_empty(),
            alignment_errors,
        })
    }
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    analysis: &'a Analysis,
    aligned: bool,
    alignment_errors: Vec<AlignmentError>,
}

async fn parameter_metadata(
    protocol: &SharedProtocol,
    statement: StatementHandle,
) -> Result<Vec<ParameterMetadata>, StreamError> {
    let mut driver = protocol.lock().await;
    driver
        .parameter_metadata(statement)
        .await
        .map_err(StreamError::Metadata)
}

async fn column_metadata(
    protocol: &SharedProtocol,
    statement: StatementHandle,
) -> Result<Vec<ColumnMetadata>, StreamError> {
    let mut driver = protocol.lock().await;
    driver
        .column_metadata(statement)
        .await
        .map_err(StreamError::Metadata)
}

/// Prepare `sql` with `options`, read the metadata each side asks about, and close it.
pub(crate) async fn analyze(
    protocol: &SharedProtocol,
    sql: &str,
    options: &PrepareOptions,
    written: Option<Vec<NativeType>>,
    read: Option<Vec<ColumnType>>,
) -> Result<Analysis, StreamError> {
    with_resource(
        lifecycle::prepare(protocol, sql, options),
        |statement| async move {
            let (parameters, written) = match written {
                Some(written) => (parameter_metadata(protocol, statement).await?, written),
                None => (Vec::new(), Vec::new()),
            };
            let (columns, read) = match read {
                Some(read) => (column_metadata(protocol, statement).await?, read),
                None => (Vec::new(), Vec::new()),
            };
            Ok(Analysis::new(sql, parameters, written, columns, read))
        },
        |statement| lifecycle::close_statement(protocol, statement),
    )
    .await
}

/// Analyze a parameterized query against the encoder and decoder that would run it.
pub async fn prepare_query_analysis<A, B>(
    protocol: &SharedProtocol,
    sql: &str,
    encoder: &dyn ParamEncoder<A>,
    decoder: &dyn RowDecoder<B>,
) -> Result<Analysis, StreamError> {
    analyze(
        protocol,
        sql,
        &PrepareOptions::default(),
        Some(encoder.parameter_types()),
        Some(decoder.column_types()),
    )
    .await
}

/// Analyze a query without parameters against the decoder that would read it.
pub async fn prepare_query_analysis0<B>(
    protocol: &SharedProtocol,
    sql: &str,
    decoder: &dyn RowDecoder<B>,
) -> Result<Analysis, StreamError> {
    analyze(
        protocol,
        sql,
        &PrepareOptions::default(),
        None,
        Some(decoder.column_types()),
    )
    .await
}

/// Analyze a parameterized update against the encoder that would run it.
pub async fn prepare_update_analysis<A>(
    protocol: &SharedProtocol,
    sql: &str,
    encoder: &dyn ParamEncoder<A>,
) -> Result<Analysis, StreamError> {
    analyze(
        protocol,
        sql,
        &PrepareOptions::default(),
        Some(encoder.parameter_types()),
        None,
    )
    .await
}

/// Analyze an update without parameters; only checks that it prepares.
pub async fn prepare_update_analysis0(
    protocol: &SharedProtocol,
    sql: &str,
) -> Result<Analysis, StreamError> {
    analyze(protocol, sql, &PrepareOptions::default(), None, None).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::{share, MockDriver, STMT};
    use crate::driver::ParameterMode;
    use crate::error::{DecodeError, DriverError, EncodeError, ErrorKind};
    use crate::types::{decoder, encoder, FnDecoder, FnEncoder, Row, SqlValue};
    use mockall::Sequence;

    fn preparing(mock: &mut MockDriver) {
        mock.expect_prepare().times(1).returning(|_, _| Ok(STMT));
        mock.expect_execute_query().times(0);
        mock.expect_execute_update().times(0);
        mock.expect_execute_batch().times(0);
    }

    fn column(name: &str, native_type: NativeType, nullability: Nullability) -> ColumnMetadata {
        ColumnMetadata::new(name, native_type, nullability)
    }

    #[tokio::test]
    async fn test_empty_statement_has_empty_mappings() {
        let mut mock = MockDriver::new();
        preparing(&mut mock);
        mock.expect_parameter_metadata().times(1).returning(|_| Ok(vec![]));
        mock.expect_column_metadata().times(1).returning(|_| Ok(vec![]));
        mock.expect_close_statement().times(1).returning(|_| Ok(()));
        let protocol = share(mock);

        let analysis = prepare_query_analysis(
            &protocol,
            "CALL noop()",
            &FnEncoder::new(vec![], |_: &()| -> Result<Vec<SqlValue>, EncodeError> {
                Ok(vec![])
            }),
            &FnDecoder::new(vec![], |_: &Row| -> Result<(), DecodeError> { Ok(()) }),
        )
        .await
        .unwrap();

        assert!(analysis.parameter_mappings.is_empty());
        assert!(analysis.column_mappings.is_empty());
        assert!(analysis.is_aligned());
    }

    #[tokio::test]
    async fn test_query_analysis_pairs_positions() {
        let mut mock = MockDriver::new();
        let mut seq = Sequence::new();
        mock.expect_prepare()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(STMT));
        mock.expect_parameter_metadata()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![ParameterMetadata::input(NativeType::BigInt)]));
        mock.expect_column_metadata()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(vec![
                    column("id", NativeType::BigInt, Nullability::NoNulls),
                    column("name", NativeType::Varchar, Nullability::Nullable),
                ])
            });
        mock.expect_close_statement()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_execute_query().times(0);
        let protocol = share(mock);

        let analysis = prepare_query_analysis(
            &protocol,
            "SELECT id, name FROM users WHERE id = ?",
            &encoder::<i64>(),
            &decoder::<(i64, Option<String>)>(),
        )
        .await
        .unwrap();

        assert_eq!(analysis.parameter_mappings.len(), 1);
        assert_eq!(analysis.parameter_mappings[0].expected, Some(NativeType::BigInt));
        assert_eq!(
            analysis.parameter_mappings[0].metadata.as_ref().map(|m| m.mode),
            Some(ParameterMode::In)
        );
        assert_eq!(analysis.column_mappings.len(), 2);
        assert!(analysis.is_aligned());
    }

    #[tokio::test]
    async fn test_query_analysis0_skips_parameters() {
        let mut mock = MockDriver::new();
        preparing(&mut mock);
        mock.expect_parameter_metadata().times(0);
        mock.expect_column_metadata()
            .times(1)
            .returning(|_| Ok(vec![column("n", NativeType::Integer, Nullability::NoNulls)]));
        mock.expect_close_statement().times(1).returning(|_| Ok(()));
        let protocol = share(mock);

        let analysis = prepare_query_analysis0(&protocol, "SELECT n FROM t", &decoder::<i32>())
            .await
            .unwrap();
        assert!(analysis.parameter_mappings.is_empty());
        assert_eq!(analysis.column_mappings.len(), 1);
    }

    #[tokio::test]
    async fn test_update_analysis_skips_columns() {
        let mut mock = MockDriver::new();
        preparing(&mut mock);
        mock.expect_parameter_metadata().times(1).returning(|_| {
            Ok(vec![
                ParameterMetadata::input(NativeType::Varchar),
                ParameterMetadata::input(NativeType::Integer),
            ])
        });
        mock.expect_column_metadata().times(0);
        mock.expect_close_statement().times(1).returning(|_| Ok(()));
        let protocol = share(mock);

        let analysis = prepare_update_analysis(
            &protocol,
            "INSERT INTO users (name, age) VALUES (?, ?)",
            &encoder::<(String, i32)>(),
        )
        .await
        .unwrap();
        assert_eq!(analysis.parameter_mappings.len(), 2);
        assert!(analysis.column_mappings.is_empty());
        assert!(analysis.is_aligned());
    }

    #[tokio::test]
    async fn test_update_analysis0_only_prepares() {
        let mut mock = MockDriver::new();
        preparing(&mut mock);
        mock.expect_parameter_metadata().times(0);
        mock.expect_column_metadata().times(0);
        mock.expect_close_statement().times(1).returning(|_| Ok(()));
        let protocol = share(mock);

        let analysis = prepare_update_analysis0(&protocol, "DELETE FROM t")
            .await
            .unwrap();
        assert_eq!(analysis.sql, "DELETE FROM t");
        assert!(analysis.is_aligned());
    }

    #[tokio::test]
    async fn test_metadata_failure_still_releases() {
        let mut mock = MockDriver::new();
        preparing(&mut mock);
        mock.expect_parameter_metadata()
            .returning(|_| Err(DriverError::Unsupported("parameter metadata".to_string())));
        mock.expect_close_statement().times(1).returning(|_| Ok(()));
        let protocol = share(mock);

        let err = prepare_update_analysis(&protocol, "UPDATE t SET a = ?", &encoder::<i64>())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Metadata);
    }

    #[test]
    fn test_alignment_errors() {
        let analysis = Analysis::new(
            "SELECT a, b FROM t WHERE c = ?",
            vec![ParameterMetadata::input(NativeType::Integer)],
            vec![NativeType::Double, NativeType::Varchar],
            vec![
                column("a", NativeType::Binary, Nullability::NoNulls),
                column("b", NativeType::Varchar, Nullability::Nullable),
                column("c", NativeType::Date, Nullability::Unknown),
            ],
            vec![
                ColumnType::required(NativeType::Varchar),
                ColumnType::required(NativeType::Varchar),
            ],
        );

        let errors = analysis.alignment_errors();
        assert_eq!(errors.len(), 5);
        assert!(matches!(
            errors[0],
            AlignmentError::ParameterTypeError { position: 0, .. }
        ));
        assert!(matches!(
            errors[1],
            AlignmentError::ParameterMisalignment { position: 1, .. }
        ));
        assert!(matches!(
            errors[2],
            AlignmentError::ColumnTypeError { position: 0, .. }
        ));
        assert!(matches!(
            errors[3],
            AlignmentError::NullabilityMisalignment { position: 1, .. }
        ));
        assert!(matches!(
            errors[4],
            AlignmentError::ColumnMisalignment { position: 2, .. }
        ));
        assert!(!analysis.is_aligned());
        assert!(analysis.summary().contains("error: Column 0 (a)"));
    }

    #[test]
    fn test_to_json() {
        let analysis = Analysis::new(
            "SELECT id FROM t",
            vec![],
            vec![],
            vec![column("id", NativeType::BigInt, Nullability::NoNulls)],
            vec![ColumnType::required(NativeType::BigInt)],
        );

        let json: serde_json::Value = serde_json::from_str(&analysis.to_json().unwrap()).unwrap();
        assert_eq!(json["sql"], "SELECT id FROM t");
        assert_eq!(json["column_mappings"][0]["metadata"]["name"], "id");
        assert_eq!(json["column_mappings"][0]["expected"]["nullable"], false);
        assert_eq!(json["aligned"], true);
        assert_eq!(json["alignment_errors"], serde_json::json!([]));
    }

    #[test]
    fn test_to_json_carries_alignment_errors() {
        let analysis = Analysis::new(
            "SELECT name FROM t WHERE id = ?",
            vec![ParameterMetadata::input(NativeType::Integer)],
            vec![NativeType::Integer],
            vec![column("name", NativeType::Varchar, Nullability::Nullable)],
            vec![ColumnType::required(NativeType::Varchar)],
        );

        let json: serde_json::Value = serde_json::from_str(&analysis.to_json().unwrap()).unwrap();
        assert_eq!(json["aligned"], false);
        assert_eq!(json["alignment_errors"][0]["kind"], "nullability_misalignment");
        assert_eq!(json["alignment_errors"][0]["position"], 0);
        assert_eq!(json["alignment_errors"][0]["name"], "name");
        assert_eq!(json["parameter_mappings"][0]["position"], 0);
    }
}
