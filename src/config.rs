//! Client configuration
//!
//! A single JSON document. Every field is optional; missing fields take the
//! defaults below.
//!
//! ```json
//! {
//!   "initial_result_capacity": 1024,
//!   "default_abort_option": "abort_on_error",
//!   "default_send_policy": "force",
//!   "log_level": "warn"
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{AbortOption, SendPolicy};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::query::DEFAULT_INITIAL_CAPACITY;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    /// Numeric code in the client error range
    pub fn code(&self) -> i32 {
        match self {
            ConfigError::Read { .. } => 4900,
            ConfigError::Parse(_) => 4901,
            ConfigError::Invalid { .. } => 4902,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Client-wide defaults for query execution and batches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Result header slots allocated before the first doubling (default: 1024)
    #[serde(default = "default_initial_result_capacity")]
    pub initial_result_capacity: usize,

    /// Abort option for round trips issued by the executor (default: "default")
    #[serde(default)]
    pub default_abort_option: AbortOption,

    /// Send policy for round trips issued by the executor (default: "deferred")
    #[serde(default)]
    pub default_send_policy: SendPolicy,

    /// Minimum log severity (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: Severity,
}

fn default_initial_result_capacity() -> usize {
    DEFAULT_INITIAL_CAPACITY
}

fn default_log_level() -> Severity {
    Severity::Info
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            initial_result_capacity: default_initial_result_capacity(),
            default_abort_option: AbortOption::default(),
            default_send_policy: SendPolicy::default(),
            log_level: default_log_level(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&content)?;

        let capacity = config.initial_result_capacity.to_string();
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("initial_result_capacity", &capacity),
                ("log_level", config.log_level.as_str()),
                ("path", &path.display().to_string()),
            ],
        );
        Ok(config)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: ClientConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.initial_result_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "initial_result_capacity",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Install `log_level` as the process-wide minimum severity.
    pub fn apply_logging(&self) {
        Logger::set_min_severity(self.log_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.initial_result_capacity, 1024);
        assert_eq!(config.default_abort_option, AbortOption::Default);
        assert_eq!(config.default_send_policy, SendPolicy::Deferred);
        assert_eq!(config.log_level, Severity::Info);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ClientConfig::from_json("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_explicit_values() {
        let config = ClientConfig::from_json(
            r#"{
                "initial_result_capacity": 16,
                "default_abort_option": "ignore_error",
                "default_send_policy": "force",
                "log_level": "warn"
            }"#,
        )
        .unwrap();
        assert_eq!(config.initial_result_capacity, 16);
        assert_eq!(config.default_abort_option, AbortOption::IgnoreError);
        assert_eq!(config.default_send_policy, SendPolicy::Force);
        assert_eq!(config.log_level, Severity::Warn);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = ClientConfig::from_json(r#"{"initial_result_capacity": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "initial_result_capacity", .. }));
        assert_eq!(err.code(), 4902);
    }

    #[test]
    fn test_bad_json_rejected() {
        let err = ClientConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"initial_result_capacity": 64}}"#).unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.initial_result_capacity, 64);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert_eq!(err.code(), 4900);
    }
}
