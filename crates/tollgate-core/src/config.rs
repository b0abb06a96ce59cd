//! Configuration management for tollgate
//!
//! Handles loading and validation of `tollgate.toml` files:
//!
//! ```toml
//! [bucket]
//! capacity = 10.0
//! refill_rate = 2.0
//! refill_interval_secs = 1.0
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//!
//! [gate]
//! backends = ["127.0.0.1:8001", "127.0.0.1:8002"]
//! ```
//!
//! Every section is optional. Bucket parameters are fixed for the lifetime
//! of a bucket; changing them means loading the file again and building a
//! new one.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gate::GateConfig;
use crate::logging::LogConfig;
use crate::token_bucket::BucketConfig;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Token bucket parameters
    #[serde(default)]
    pub bucket: BucketConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LogConfig,

    /// Admission gate backends
    #[serde(default)]
    pub gate: GateConfig,
}

impl Config {
    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let display = path.display().to_string();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(display).into());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(display, e.to_string()))?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> crate::Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section, so a file that validates also starts up
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bucket
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        self.logging
            .filter()
            .map_err(|e| ConfigError::ValidationError(format!("logging.level: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::logging::LogFormat;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bucket.capacity, 10.0);
        assert_eq!(config.bucket.refill_rate, 2.0);
        assert_eq!(config.bucket.refill_interval_secs, 1.0);
        assert_eq!(config.logging.level, "info");
        assert!(config.gate.backends.is_empty());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn full_file_parses() {
        let config = Config::from_toml_str(
            r#"
            [bucket]
            capacity = 100.0
            refill_rate = 10.0
            refill_interval_secs = 0.5

            [logging]
            level = "debug"
            format = "json"

            [gate]
            backends = ["127.0.0.1:8001", "127.0.0.1:8002"]
            "#,
        )
        .unwrap();
        assert_eq!(config.bucket.capacity, 100.0);
        assert_eq!(config.bucket.refill_interval_secs, 0.5);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.gate.backends.len(), 2);
    }

    #[test]
    fn interval_defaults_to_one_second() {
        let config = Config::from_toml_str(
            r#"
            [bucket]
            capacity = 5.0
            refill_rate = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(config.bucket.refill_interval_secs, 1.0);
    }

    #[test]
    fn invalid_bucket_fails_validation() {
        let err = Config::from_toml_str(
            r#"
            [bucket]
            capacity = 0.0
            refill_rate = 1.0
            "#,
        )
        .unwrap_err();
        match err {
            Error::Config(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains("capacity"), "{msg}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_log_level_fails_validation() {
        let err = Config::from_toml_str(
            r#"
            [logging]
            level = "tollgate=loud"
            "#,
        )
        .unwrap_err();
        match err {
            Error::Config(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains("logging.level"), "{msg}");
                assert!(msg.contains("tollgate=loud"), "{msg}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn filter_directives_are_valid_levels() {
        let config = Config::from_toml_str(
            r#"
            [logging]
            level = "warn,tollgate_core=debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.logging.level, "warn,tollgate_core=debug");
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Config::from_toml_str("[bucket\ncapacity = ").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::ParseFailed(_))));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Config::load_from(Path::new("/definitely/not/here/tollgate.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[bucket]\ncapacity = 3.0\nrefill_rate = 1.5").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.bucket.capacity, 3.0);
        assert_eq!(config.bucket.refill_rate, 1.5);
    }
}
