//! Session: the entry point for running statements against a driver.
//!
//! A session owns the shared driver handle and the defaults from its
//! [`SessionConfig`]. Every stream it opens shares the same driver, which
//! serializes their calls.

use crate::connection::config::SessionConfig;
use crate::driver::{self, DriverProtocol, KeyColumns, SharedProtocol};
use crate::error::StreamError;
use crate::query::analysis::{self, Analysis};
use crate::query::scope::with_resource;
use crate::query::statement as lifecycle;
use crate::query::{Configuration, Execution, RowStream, StreamBuilder};
use crate::types::{ParamEncoder, RowDecoder};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Database session running statements through one driver.
pub struct Session {
    /// Driver shared with every open stream
    protocol: SharedProtocol,

    /// Session configuration
    config: SessionConfig,

    /// Statements prepared for execution
    execution_count: Arc<AtomicU64>,
}

impl Session {
    /// Create a session over an already shared driver.
    pub fn new(protocol: SharedProtocol, config: SessionConfig) -> Self {
        Self {
            protocol,
            config,
            execution_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a session with the default configuration that takes ownership of `driver`.
    pub fn from_driver<D: DriverProtocol + 'static>(driver: D) -> Self {
        Self::new(driver::shared(driver), SessionConfig::default())
    }

    /// Get session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The shared driver handle.
    pub fn protocol(&self) -> &SharedProtocol {
        &self.protocol
    }

    /// Number of statements this session has prepared in order to run them.
    ///
    /// Builders that are never opened, failed preparations and analyses do not count.
    pub fn execution_count(&self) -> u64 {
        self.execution_count.load(Ordering::SeqCst)
    }

    /// Start a stream seeded with the session's chunk size, cursor modes and timeout.
    pub fn statement(&self, sql: impl Into<String>) -> StreamBuilder {
        StreamBuilder::new(self.protocol.clone(), sql)
            .count_prepared(Arc::clone(&self.execution_count))
            .options(self.config.prepare_options())
            .configure(self.defaults())
            .chunk_size(self.config.chunk_size)
    }

    /// Session-wide instructions applied before the caller's.
    fn defaults(&self) -> Configuration {
        match self.config.query_timeout {
            Some(timeout) => Configuration::new().query_timeout(timeout),
            None => Configuration::new(),
        }
    }

    /// Stream the rows of a query in chunks of `chunk_size`.
    pub async fn stream<T, D>(
        &self,
        sql: &str,
        configuration: Configuration,
        chunk_size: usize,
        decoder: D,
    ) -> Result<RowStream<T>, StreamError>
    where
        D: RowDecoder<T> + 'static,
    {
        self.statement(sql)
            .configure(configuration)
            .chunk_size(chunk_size)
            .open(decoder)
            .await
    }

    /// Run an update and stream the keys it generated.
    pub async fn update_with_generated_keys<T, D>(
        &self,
        sql: &str,
        configuration: Configuration,
        key_columns: KeyColumns,
        chunk_size: usize,
        decoder: D,
    ) -> Result<RowStream<T>, StreamError>
    where
        D: RowDecoder<T> + 'static,
    {
        self.statement(sql)
            .key_columns(key_columns)
            .configure(configuration)
            .execution(Execution::UpdateWithGeneratedKeys)
            .chunk_size(chunk_size)
            .open(decoder)
            .await
    }

    /// Run an update once per input record as one batch and stream the generated keys.
    ///
    /// An empty `inputs` still executes the (empty) batch and reads its keys.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_many_with_generated_keys<A, I, E, T, D>(
        &self,
        sql: &str,
        configuration: Configuration,
        key_columns: KeyColumns,
        inputs: I,
        encoder: E,
        chunk_size: usize,
        decoder: D,
    ) -> Result<RowStream<T>, StreamError>
    where
        A: 'static,
        I: IntoIterator<Item = A>,
        I::IntoIter: Send + 'static,
        E: ParamEncoder<A> + 'static,
        D: RowDecoder<T> + 'static,
    {
        self.statement(sql)
            .key_columns(key_columns)
            .configure(configuration)
            .execution(Execution::batch(inputs, encoder))
            .chunk_size(chunk_size)
            .open(decoder)
            .await
    }

    /// Run an update and return the affected row count.
    pub async fn execute_update(
        &self,
        sql: &str,
        configuration: Configuration,
    ) -> Result<i64, StreamError> {
        let configuration = self.defaults().then(configuration);
        let options = self.config.prepare_options();
        let protocol = &self.protocol;
        let counter = &self.execution_count;

        with_resource(
            lifecycle::prepare(protocol, sql, &options),
            |statement| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                configuration.apply(protocol, statement).await?;
                lifecycle::execute_update(protocol, statement).await
            },
            |statement| lifecycle::close_statement(protocol, statement),
        )
        .await
    }

    /// Run an update once per input record as one batch, returning the total row count.
    ///
    /// Entries the driver reports without a count (negative values) add nothing.
    pub async fn update_many<A, I>(
        &self,
        sql: &str,
        configuration: Configuration,
        inputs: I,
        encoder: &dyn ParamEncoder<A>,
    ) -> Result<i64, StreamError>
    where
        I: IntoIterator<Item = A>,
    {
        let configuration = self.defaults().then(configuration);
        let options = self.config.prepare_options();
        let protocol = &self.protocol;
        let counter = &self.execution_count;

        with_resource(
            lifecycle::prepare(protocol, sql, &options),
            |statement| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                configuration.apply(protocol, statement).await?;
                let rows = inputs.into_iter().map(|input| encoder.encode(&input));
                lifecycle::add_batches(protocol, statement, rows).await?;
                let counts = lifecycle::execute_batch(protocol, statement).await?;

                let total: i64 = counts.iter().filter(|count| **count > 0).sum();
                debug!(statement = statement.id(), total, "Batch update finished");
                Ok(total)
            },
            |statement| lifecycle::close_statement(protocol, statement),
        )
        .await
    }

    /// Analyze a parameterized query without executing it.
    ///
    /// The statement is prepared with the session's cursor modes, as it would be to run it.
    pub async fn prepare_query_analysis<A, B>(
        &self,
        sql: &str,
        encoder: &dyn ParamEncoder<A>,
        decoder: &dyn RowDecoder<B>,
    ) -> Result<Analysis, StreamError> {
        let options = self.config.prepare_options();
        analysis::analyze(
            &self.protocol,
            sql,
            &options,
            Some(encoder.parameter_types()),
            Some(decoder.column_types()),
        )
        .await
    }

    /// Analyze a query without parameters without executing it.
    pub async fn prepare_query_analysis0<B>(
        &self,
        sql: &str,
        decoder: &dyn RowDecoder<B>,
    ) -> Result<Analysis, StreamError> {
        let options = self.config.prepare_options();
        analysis::analyze(
            &self.protocol,
            sql,
            &options,
            None,
            Some(decoder.column_types()),
        )
        .await
    }

    /// Analyze a parameterized update without executing it.
    pub async fn prepare_update_analysis<A>(
        &self,
        sql: &str,
        encoder: &dyn ParamEncoder<A>,
    ) -> Result<Analysis, StreamError> {
        let options = self.config.prepare_options();
        analysis::analyze(
            &self.protocol,
            sql,
            &options,
            Some(encoder.parameter_types()),
            None,
        )
        .await
    }

    /// Analyze an update without parameters without executing it.
    pub async fn prepare_update_analysis0(&self, sql: &str) -> Result<Analysis, StreamError> {
        let options = self.config.prepare_options();
        analysis::analyze(&self.protocol, sql, &options, None, None).await
    }
}
