//! Crate configuration loaded from JSON.
//!
//! ```json
//! {
//!   "slow_request_threshold_ms": 500,
//!   "logging": { "filter": "info,bulwark=debug", "format": "json" },
//!   "pipelines": {
//!     "redis-pipeline": { "max_retry_attempts": 3, "total_timeout_ms": 30000 }
//!   }
//! }
//! ```

use crate::errors::BulwarkError;
use crate::observability::LoggingConfig;
use crate::resilience::ResilienceOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
///
/// Every field is optional in the JSON source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulwarkConfig {
    /// Requests slower than this are logged at warn level.
    pub slow_request_threshold_ms: u64,
    /// Tracing subscriber settings.
    pub logging: LoggingConfig,
    /// Resilience pipelines by name.
    pub pipelines: BTreeMap<String, ResilienceOptions>,
}

impl Default for BulwarkConfig {
    fn default() -> Self {
        Self {
            slow_request_threshold_ms: 500,
            logging: LoggingConfig::default(),
            pipelines: BTreeMap::new(),
        }
    }
}

impl BulwarkConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`BulwarkError::Serialization`] for malformed JSON, otherwise
    /// whatever [`BulwarkConfig::validate`] reports.
    pub fn from_json_str(json: &str) -> Result<Self, BulwarkError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`BulwarkError::Io`] if the file cannot be read, otherwise the
    /// same errors as [`BulwarkConfig::from_json_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BulwarkError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Checks the configuration for unusable values.
    ///
    /// # Errors
    ///
    /// Returns [`BulwarkError::Config`] for a zero slow threshold or an empty
    /// pipeline name, and [`BulwarkError::InvalidOptions`] for the first
    /// pipeline whose options are invalid.
    pub fn validate(&self) -> Result<(), BulwarkError> {
        if self.slow_request_threshold_ms == 0 {
            return Err(BulwarkError::Config(
                "slow_request_threshold_ms must be greater than zero".to_string(),
            ));
        }
        for (name, options) in &self.pipelines {
            if name.trim().is_empty() {
                return Err(BulwarkError::Config("pipeline names must not be empty".to_string()));
            }
            options.validate(name)?;
        }
        Ok(())
    }

    /// Returns the slow request threshold.
    #[must_use]
    pub const fn slow_request_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_request_threshold_ms)
    }

    /// Adds or replaces a pipeline entry.
    #[must_use]
    pub fn with_pipeline(mut self, name: impl Into<String>, options: ResilienceOptions) -> Self {
        self.pipelines.insert(name.into(), options);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::LogFormat;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "slow_request_threshold_ms": 250,
        "logging": { "filter": "debug", "format": "json" },
        "pipelines": {
            "redis-pipeline": { "max_retry_attempts": 2, "retry_base_delay_ms": 100 },
            "orders": {}
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = BulwarkConfig::from_json_str(SAMPLE).unwrap();

        assert_eq!(config.slow_request_threshold(), Duration::from_millis(250));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.pipelines.len(), 2);
        assert_eq!(config.pipelines["redis-pipeline"].max_retry_attempts, 2);
        assert_eq!(config.pipelines["orders"], ResilienceOptions::default());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = BulwarkConfig::from_json_str("{}").unwrap();
        assert_eq!(config, BulwarkConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = BulwarkConfig::from_json_str(r#"{"slow_request_threshold_ms": 0}"#).unwrap_err();
        assert!(matches!(err, BulwarkError::Config(_)));

        let err = BulwarkConfig::from_json_str(
            r#"{"pipelines": {"redis": {"circuit_breaker_failure_ratio": 3.0}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, BulwarkError::InvalidOptions { ref pipeline, .. } if pipeline == "redis"));

        let err = BulwarkConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, BulwarkError::Serialization(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = BulwarkConfig::from_file(file.path()).unwrap();
        assert!(config.pipelines.contains_key("orders"));

        let missing = BulwarkConfig::from_file(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(BulwarkError::Io(_))));
    }

    #[test]
    fn test_builder_round_trips_through_json() {
        let config = BulwarkConfig::default()
            .with_pipeline("catalog", ResilienceOptions::new().with_max_retry_attempts(1));
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(BulwarkConfig::from_json_str(&json).unwrap(), config);
    }
}
