//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind address {0}")]
    InvalidBindAddress(String),

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Invalid timeout: {0} must be between 1 and {1} seconds")]
    InvalidTimeout(&'static str, u64),

    #[error("JWT secret must be at least {0} bytes in production")]
    JwtSecretTooShort(usize),

    #[error("max_message_size must be between 1 and {0} bytes")]
    InvalidMessageSize(usize),

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("history_limit ({history_limit}) exceeds bus max_log_len ({max_log_len})")]
    HistoryExceedsRetention {
        history_limit: usize,
        max_log_len: usize,
    },
}
