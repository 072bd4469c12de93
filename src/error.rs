//! Error types for graph replication and worker coordination.

use thiserror::Error;

use crate::config::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphWorkersError {
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Graph error: {0}")]
    Graph(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Queue error: {0}")]
    Queue(String),
    #[error("Worker error: {0}")]
    Worker(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Timeout error: {0}")]
    Timeout(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid template action: {0}")]
    InvalidTemplateAction(String),
}

impl GraphWorkersError {
    pub fn graph(message: impl Into<String>) -> Self {
        Self::Graph(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue(message.into())
    }
}

impl From<serde_json::Error> for GraphWorkersError {
    fn from(error: serde_json::Error) -> Self {
        GraphWorkersError::Serialization(format!("JSON serialization error: {error}"))
    }
}

impl From<ConfigurationError> for GraphWorkersError {
    fn from(error: ConfigurationError) -> Self {
        GraphWorkersError::Configuration(error.to_string())
    }
}

impl From<std::io::Error> for GraphWorkersError {
    fn from(error: std::io::Error) -> Self {
        GraphWorkersError::Worker(format!("I/O error: {error}"))
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for GraphWorkersError {
    fn from(err: sqlx::Error) -> Self {
        GraphWorkersError::Storage(err.to_string())
    }
}

pub type GraphWorkersResult<T> = std::result::Result<T, GraphWorkersError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphWorkersError::graph("vertex 'a' not found");
        assert_eq!(err.to_string(), "Graph error: vertex 'a' not found");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: GraphWorkersError = json_err.into();
        assert!(matches!(err, GraphWorkersError::Serialization(_)));
    }
}
