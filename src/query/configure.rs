//! Caller-supplied statement configuration.
//!
//! A [`Configuration`] is an ordered list of instructions applied to a freshly
//! prepared statement, after the engine has set the fetch size and before the
//! statement is executed. Instructions run in the order they were added, so a
//! later bind to the same position wins.

use crate::driver::{FetchDirection, SharedProtocol, StatementHandle, StatementOption};
use crate::error::{EncodeError, StreamError};
use crate::types::{ParamEncoder, SqlValue};
use std::time::Duration;
use tracing::trace;

/// One configuration step.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Bind a value to the parameter at a 0-based position
    Bind { position: usize, value: SqlValue },
    /// Set a statement option
    Option(StatementOption),
}

/// Ordered set of instructions applied to a statement before execution.
///
/// There is no fetch-size instruction; the fetch size always equals the
/// stream's chunk size.
///
/// # Example
///
/// ```
/// use chunkquery::query::Configuration;
/// use std::time::Duration;
///
/// let configuration = Configuration::new()
///     .bind(0, "alice")
///     .bind(1, 42i64)
///     .query_timeout(Duration::from_secs(30));
/// assert_eq!(configuration.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Configuration {
    instructions: Vec<Instruction>,
}

impl Configuration {
    /// An empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value to the parameter at `position`.
    pub fn bind(mut self, position: usize, value: impl Into<SqlValue>) -> Self {
        self.instructions.push(Instruction::Bind {
            position,
            value: value.into(),
        });
        self
    }

    /// Bind values to consecutive positions starting at 0.
    pub fn bind_all<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        for (position, value) in values.into_iter().enumerate() {
            self.instructions.push(Instruction::Bind {
                position,
                value: value.into(),
            });
        }
        self
    }

    /// Encode a whole record and bind it starting at position 0.
    pub fn bind_row<A>(self, encoder: &dyn ParamEncoder<A>, value: &A) -> Result<Self, EncodeError> {
        Ok(self.bind_all(encoder.encode(value)?))
    }

    /// Limit the number of rows the cursor returns.
    pub fn max_rows(mut self, rows: usize) -> Self {
        self.instructions
            .push(Instruction::Option(StatementOption::MaxRows(rows)));
        self
    }

    /// Set the execution timeout.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.instructions
            .push(Instruction::Option(StatementOption::QueryTimeout(timeout)));
        self
    }

    /// Set the traversal direction hint.
    pub fn fetch_direction(mut self, direction: FetchDirection) -> Self {
        self.instructions
            .push(Instruction::Option(StatementOption::FetchDirection(direction)));
        self
    }

    /// Append another configuration's instructions after this one's.
    pub fn then(mut self, other: Configuration) -> Self {
        self.instructions.extend(other.instructions);
        self
    }

    /// Instructions in application order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Check whether there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Apply every instruction to `statement`, stopping at the first failure.
    pub(crate) async fn apply(
        &self,
        protocol: &SharedProtocol,
        statement: StatementHandle,
    ) -> Result<(), StreamError> {
        if self.instructions.is_empty() {
            return Ok(());
        }

        let mut driver = protocol.lock().await;
        for instruction in &self.instructions {
            let applied = match instruction {
                Instruction::Bind { position, value } => {
                    trace!(statement = statement.id(), position, value = %value, "Binding parameter");
                    driver
                        .bind_parameter(statement, *position, value.clone())
                        .await
                }
                Instruction::Option(option) => driver.apply_option(statement, *option).await,
            };
            applied.map_err(StreamError::Configuration)?;
        }
        Ok(())
    }
}
