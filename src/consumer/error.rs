//! Error types for the consumer engine

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::stream_log;

/// Invalid engine configuration, reported at construction
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No stream names were configured
    #[error("streams and group are required: no streams configured")]
    NoStreams,

    /// The consumer group name is empty
    #[error("streams and group are required: group name is empty")]
    EmptyGroup,
}

/// Errors returned by the engine's lifecycle operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration was rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `start` was called on an engine that is not fresh
    #[error("consumer already started")]
    AlreadyStarted,

    /// Workers were still running when the stop deadline passed
    #[error("workers did not exit within {0:?}")]
    DeadlineExceeded(Duration),

    /// The log service could not be reached while building the engine
    #[error("stream log error: {0}")]
    Log(#[from] stream_log::Error),
}

/// Why the engine reports itself unhealthy
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HealthError {
    /// No non-empty batch was read within the staleness window
    #[error("no recent poll: last successful read at {since}")]
    Stale { since: DateTime<Utc> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        assert!(ConfigError::NoStreams.to_string().contains("no streams"));
        assert!(ConfigError::EmptyGroup.to_string().contains("group"));
    }

    #[test]
    fn test_engine_error_from_config_error() {
        let err: EngineError = ConfigError::EmptyGroup.into();
        assert!(matches!(err, EngineError::Config(ConfigError::EmptyGroup)));
        assert_eq!(err.to_string(), ConfigError::EmptyGroup.to_string());
    }

    #[test]
    fn test_deadline_exceeded_display() {
        let err = EngineError::DeadlineExceeded(Duration::from_millis(50));
        assert!(err.to_string().contains("50ms"));
    }

    #[test]
    fn test_stale_display() {
        let since = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let err = HealthError::Stale { since };
        assert!(err.to_string().starts_with("no recent poll"));
        assert!(err.to_string().contains("2024-01-01"));
    }
}
