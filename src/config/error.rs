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
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Unknown default gateway: {0}")]
    UnknownDefaultGateway(String),

    #[error("Invalid card gateway API key format")]
    InvalidCardApiKey,

    #[error("Invalid card gateway webhook secret format")]
    InvalidCardWebhookSecret,

    #[error("Notification URL must be absolute")]
    InvalidNotificationUrl,

    #[error("Tax rate must be below 100 percent")]
    InvalidTaxRate,

    #[error("Invoice due days must be between 1 and 90")]
    InvalidDueDays,
}
