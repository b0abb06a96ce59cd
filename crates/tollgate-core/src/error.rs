//! Error types for tollgate-core

use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tollgate-core
#[derive(Error, Debug)]
pub enum Error {
    /// Token bucket construction or argument errors
    #[error("Bucket error: {0}")]
    Bucket(#[from] BucketError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Admission gate errors
    #[error("Gate error: {0}")]
    Gate(#[from] GateError),
}

impl Error {
    /// Return a one-line hint on how to resolve the error.
    #[must_use]
    pub fn remediation(&self) -> String {
        match self {
            Self::Bucket(err) => err.remediation(),
            Self::Config(err) => err.remediation(),
            Self::Gate(GateError::NoBackends) => {
                "Add at least one entry to `gate.backends` in the config file.".to_string()
            }
        }
    }
}

/// Token bucket errors.
///
/// A denied `consume` is not an error; it returns `Ok(false)`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BucketError {
    /// A construction parameter was zero, negative or not finite.
    #[error("invalid parameter `{name}`: {value} (must be a finite number greater than 0)")]
    InvalidParameter { name: &'static str, value: f64 },

    /// A call argument was negative or not a number.
    #[error("invalid argument `{name}`: {value} (must not be negative)")]
    InvalidArgument { name: &'static str, value: f64 },
}

impl BucketError {
    /// Name of the offending parameter or argument.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidParameter { name, .. } | Self::InvalidArgument { name, .. } => name,
        }
    }

    #[must_use]
    pub fn remediation(&self) -> String {
        match self {
            Self::InvalidParameter { name, .. } => {
                format!("Set `{name}` to a positive value; buckets cannot be built otherwise.")
            }
            Self::InvalidArgument { name, .. } => {
                format!("Pass a non-negative `{name}`; this is a caller bug, not a rate limit.")
            }
        }
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file {0}: {1}")]
    ReadFailed(String, String),

    #[error("Failed to parse config: {0}")]
    ParseFailed(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ConfigError {
    #[must_use]
    pub fn remediation(&self) -> String {
        match self {
            Self::FileNotFound(path) => {
                format!("Config file not found: {path}. Pass --config with the correct path.")
            }
            Self::ReadFailed(path, _) => {
                format!("Failed to read config file: {path}. Check permissions.")
            }
            Self::ParseFailed(_) => "Fix the TOML syntax in the config file.".to_string(),
            Self::ValidationError(_) => "Bucket capacity, refill_rate and refill_interval_secs \
                 must all be > 0; logging.level must be a filter such as \"info\"."
                .to_string(),
        }
    }
}

/// Admission gate errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("no backends configured")]
    NoBackends,
}
