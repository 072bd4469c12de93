//! Configuration Error Types
//!
//! Errors raised while layering configuration sources and validating the result.

use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A configuration source could not be read or parsed
    #[error("Failed to load configuration from {source_description}: {error}")]
    LoadError {
        source_description: String,
        error: String,
    },

    /// The merged configuration could not be deserialized into `WorkersConfig`
    #[error("Failed to deserialize configuration: {0}")]
    DeserializationError(String),

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
}

impl ConfigurationError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl ToString,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            context: context.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(error: config::ConfigError) -> Self {
        match error {
            config::ConfigError::FileParse { uri, cause } => Self::LoadError {
                source_description: uri.unwrap_or_else(|| "configuration file".to_string()),
                error: cause.to_string(),
            },
            config::ConfigError::Foreign(inner) => Self::LoadError {
                source_description: "configuration source".to_string(),
                error: inner.to_string(),
            },
            other => Self::DeserializationError(other.to_string()),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;
