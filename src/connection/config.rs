//! Session configuration.
//!
//! Configuration can be assembled with [`SessionConfigBuilder`] or parsed from
//! a query-string form such as
//! `chunk_size=256&result_set_type=scroll_insensitive&query_timeout=30`.

use crate::driver::{Holdability, PrepareOptions, ResultSetConcurrency, ResultSetType};
use crate::error::ConfigError;
use crate::query::DEFAULT_CHUNK_SIZE;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Defaults applied to every statement a session runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Rows per chunk when a call does not choose one
    pub chunk_size: usize,
    /// Cursor scrollability
    pub result_set_type: ResultSetType,
    /// Cursor concurrency
    pub concurrency: ResultSetConcurrency,
    /// Cursor holdability; `None` keeps the driver default
    pub holdability: Option<Holdability>,
    /// Timeout applied before the caller's configuration
    pub query_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            result_set_type: ResultSetType::ForwardOnly,
            concurrency: ResultSetConcurrency::ReadOnly,
            holdability: None,
            query_timeout: None,
        }
    }
}

impl SessionConfig {
    /// Create a new SessionConfigBuilder.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }

    /// Prepare options carrying the configured cursor modes.
    pub fn prepare_options(&self) -> PrepareOptions {
        PrepareOptions {
            result_set_type: self.result_set_type,
            concurrency: self.concurrency,
            holdability: self.holdability,
            ..PrepareOptions::default()
        }
    }
}

impl FromStr for SessionConfig {
    type Err = ConfigError;

    /// Parse `key=value` pairs separated by `&`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chunkquery::connection::SessionConfig;
    /// # use std::str::FromStr;
    /// let config = SessionConfig::from_str("chunk_size=128&concurrency=updatable")?;
    /// assert_eq!(config.chunk_size, 128);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut params = parse_pairs(s.trim().trim_start_matches('?'))?;
        let mut builder = SessionConfigBuilder::new();

        if let Some(value) = params.remove("chunk_size") {
            builder = builder.chunk_size(parse_number("chunk_size", &value)?);
        }
        if let Some(value) = params.remove("result_set_type") {
            builder = builder.result_set_type(match value.as_str() {
                "forward_only" => ResultSetType::ForwardOnly,
                "scroll_insensitive" => ResultSetType::ScrollInsensitive,
                "scroll_sensitive" => ResultSetType::ScrollSensitive,
                other => return Err(invalid("result_set_type", other)),
            });
        }
        if let Some(value) = params.remove("concurrency") {
            builder = builder.concurrency(match value.as_str() {
                "read_only" => ResultSetConcurrency::ReadOnly,
                "updatable" => ResultSetConcurrency::Updatable,
                other => return Err(invalid("concurrency", other)),
            });
        }
        if let Some(value) = params.remove("holdability") {
            builder = builder.holdability(match value.as_str() {
                "hold_cursors_over_commit" => Holdability::HoldCursorsOverCommit,
                "close_cursors_at_commit" => Holdability::CloseCursorsAtCommit,
                other => return Err(invalid("holdability", other)),
            });
        }
        if let Some(value) = params.remove("query_timeout") {
            let seconds: u64 = parse_number("query_timeout", &value)?;
            builder = builder.query_timeout(Duration::from_secs(seconds));
        }

        if let Some(unknown) = params.keys().min() {
            return Err(ConfigError::InvalidParameter {
                parameter: unknown.clone(),
                message: "Unknown parameter".to_string(),
            });
        }

        builder.build()
    }
}

/// Split `key=value` pairs and percent-decode both sides.
fn parse_pairs(query: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| ConfigError::ParseError(format!("Expected key=value, found '{}'", pair)))?;

        let key = urlencoding::decode(key)
            .map_err(|e| ConfigError::ParseError(format!("Failed to decode key: {}", e)))?
            .trim()
            .to_string();
        let value = urlencoding::decode(value)
            .map_err(|e| ConfigError::ParseError(format!("Failed to decode value: {}", e)))?
            .trim()
            .to_string();

        if params.contains_key(&key) {
            return Err(ConfigError::ParseError(format!(
                "Parameter '{}' given more than once",
                key
            )));
        }
        params.insert(key, value);
    }
    Ok(params)
}

fn parse_number<N: FromStr>(parameter: &str, value: &str) -> Result<N, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        message: format!("'{}' is not a valid number", value),
    })
}

fn invalid(parameter: &str, value: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: parameter.to_string(),
        message: format!("Unrecognized value '{}'", value),
    }
}

/// Builder for session configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    chunk_size: Option<usize>,
    result_set_type: Option<ResultSetType>,
    concurrency: Option<ResultSetConcurrency>,
    holdability: Option<Holdability>,
    query_timeout: Option<Duration>,
}

impl SessionConfigBuilder {
    /// Create a new SessionConfigBuilder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default chunk size.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Set the result set type.
    pub fn result_set_type(mut self, result_set_type: ResultSetType) -> Self {
        self.result_set_type = Some(result_set_type);
        self
    }

    /// Set the result set concurrency.
    pub fn concurrency(mut self, concurrency: ResultSetConcurrency) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Set the cursor holdability.
    pub fn holdability(mut self, holdability: Holdability) -> Self {
        self.holdability = Some(holdability);
        self
    }

    /// Set the query timeout.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Build the SessionConfig with validation.
    pub fn build(self) -> Result<SessionConfig, ConfigError> {
        let chunk_size = self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "chunk_size".to_string(),
                message: "Chunk size must be at least 1".to_string(),
            });
        }

        if self.query_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidParameter {
                parameter: "query_timeout".to_string(),
                message: "Query timeout must be greater than 0".to_string(),
            });
        }

        Ok(SessionConfig {
            chunk_size,
            result_set_type: self.result_set_type.unwrap_or_default(),
            concurrency: self.concurrency.unwrap_or_default(),
            holdability: self.holdability,
            query_timeout: self.query_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.result_set_type, ResultSetType::ForwardOnly);
        assert_eq!(config.concurrency, ResultSetConcurrency::ReadOnly);
        assert!(config.holdability.is_none());
        assert_eq!(SessionConfig::builder().build().unwrap(), config);
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::builder()
            .chunk_size(64)
            .holdability(Holdability::HoldCursorsOverCommit)
            .query_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(config.chunk_size, 64);
        assert_eq!(
            config.prepare_options().holdability,
            Some(Holdability::HoldCursorsOverCommit)
        );
        assert_eq!(config.query_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_builder_rejects_zero_chunk_size() {
        let err = SessionConfig::builder().chunk_size(0).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter { ref parameter, .. } if parameter == "chunk_size"
        ));
    }

    #[test]
    fn test_parse_full_string() {
        let config = SessionConfig::from_str(
            "chunk_size=100&result_set_type=scroll_sensitive&concurrency=updatable&holdability=close_cursors_at_commit&query_timeout=30",
        )
        .unwrap();

        assert_eq!(config.chunk_size, 100);
        assert_eq!(config.result_set_type, ResultSetType::ScrollSensitive);
        assert_eq!(config.concurrency, ResultSetConcurrency::Updatable);
        assert_eq!(config.holdability, Some(Holdability::CloseCursorsAtCommit));
        assert_eq!(config.query_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_parse_empty_string_gives_defaults() {
        assert_eq!(SessionConfig::from_str("").unwrap(), SessionConfig::default());
        assert_eq!(SessionConfig::from_str("?").unwrap(), SessionConfig::default());
    }

    #[test]
    fn test_parse_decodes_percent_escapes() {
        let config =
            SessionConfig::from_str("chunk_size=51%32&result%5Fset%5Ftype=scroll%5Fsensitive").unwrap();
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.result_set_type, ResultSetType::ScrollSensitive);
    }

    #[test]
    fn test_parse_rejects_undecodable_value() {
        // %FF is not valid UTF-8 once decoded
        assert!(matches!(
            SessionConfig::from_str("chunk_size=%FF"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            SessionConfig::from_str("chunk%5Fsize=1&chunk_size=2"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            SessionConfig::from_str("chunk_size=lots"),
            Err(ConfigError::InvalidParameter { .. })
        ));
        assert!(matches!(
            SessionConfig::from_str("chunk_size=0"),
            Err(ConfigError::InvalidParameter { .. })
        ));
        assert!(matches!(
            SessionConfig::from_str("concurrency=sometimes"),
            Err(ConfigError::InvalidParameter { .. })
        ));
        assert!(matches!(
            SessionConfig::from_str("chunk_size"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            SessionConfig::from_str("chunk_size=1&chunk_size=2"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            SessionConfig::from_str("fetch_size=10"),
            Err(ConfigError::InvalidParameter { ref parameter, .. }) if parameter == "fetch_size"
        ));
    }
}
