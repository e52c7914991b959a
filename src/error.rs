//! Error types for the adaptive performance monitor.
//!
//! This module defines custom error enums for each component of the crate,
//! providing descriptive error messages with context information.

use thiserror::Error;

/// Errors related to configuration management.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Failed to write configuration: {0}")]
    WriteError(#[from] std::io::Error),
}

/// Errors raised by a listener while handling a monitor event.
///
/// A failing listener never aborts the fan-out; the error is captured and
/// reported back to the caller of `Monitor::tick`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    #[error("Listener failed: {0}")]
    Failed(String),

    #[error("Listener panicked: {0}")]
    Panicked(String),
}

/// Errors related to logging initialization.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Could not determine the local data directory for log files")]
    DataDirectoryNotFound,

    #[error("Failed to create log directory '{path}': {source}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create log file appender: {0}")]
    AppenderCreationFailed(String),
}

/// Top-level errors of the host binary.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("Failed to serialize metrics: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::ValidationError("iterations must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration validation failed: iterations must be at least 1"
        );
    }

    #[test]
    fn test_host_error_wraps_config_error() {
        let err: HostError = ConfigError::ParseError("Invalid JSON".to_string()).into();
        assert!(matches!(err, HostError::Config(ConfigError::ParseError(_))));
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[test]
    fn test_listener_error_display() {
        let err = ListenerError::Panicked("boom".to_string());
        assert_eq!(err.to_string(), "Listener panicked: boom");
    }
}
