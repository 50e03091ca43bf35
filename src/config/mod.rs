//! Application configuration module
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Configuration is loaded with the
//! `VOWDAY_` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use vowday_billing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr());
//! ```

mod billing;
mod database;
mod error;
mod gateway;
mod server;

pub use billing::BillingConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use gateway::{CardConfig, GatewayConfig, RedirectConfig};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Contains all configuration sections for the VowDay billing service.
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Payment gateway configuration (card + redirect processors)
    pub gateway: GatewayConfig,

    /// Billing configuration (supplier identity, invoice defaults)
    pub billing: BillingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with the `VOWDAY` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `VOWDAY__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `VOWDAY__DATABASE__URL=...` -> `database.url = ...`
    /// - `VOWDAY__GATEWAY__CARD__API_KEY=...` -> `gateway.card.api_key = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("VOWDAY")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.gateway.validate()?;
        self.billing.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var("VOWDAY__DATABASE__URL", "postgresql://test@localhost/vowday");
        env::set_var("VOWDAY__GATEWAY__CARD__API_KEY", "sk_test_xxx");
        env::set_var("VOWDAY__GATEWAY__CARD__WEBHOOK_SECRET", "whsec_xxx");
        env::set_var("VOWDAY__GATEWAY__REDIRECT__CLIENT_ID", "client-id");
        env::set_var("VOWDAY__GATEWAY__REDIRECT__CLIENT_SECRET", "client-secret");
        env::set_var("VOWDAY__GATEWAY__REDIRECT__MERCHANT_ID", "8999999999");
        env::set_var(
            "VOWDAY__GATEWAY__REDIRECT__API_BASE_URL",
            "https://gw.sandbox.example.com",
        );
        env::set_var(
            "VOWDAY__GATEWAY__REDIRECT__NOTIFICATION_URL",
            "https://api.vowday.cz/webhooks/redirect",
        );
        env::set_var("VOWDAY__BILLING__SUPPLIER_NAME", "VowDay s.r.o.");
        env::set_var("VOWDAY__BILLING__SUPPLIER_ADDRESS", "Svatební 12, Praha");
        env::set_var("VOWDAY__BILLING__SUPPLIER_REGISTRATION_NUMBER", "12345678");
        env::set_var("VOWDAY__BILLING__SUPPLIER_EMAIL", "fakturace@vowday.cz");
    }

    fn clear_env() {
        env::remove_var("VOWDAY__DATABASE__URL");
        env::remove_var("VOWDAY__GATEWAY__CARD__API_KEY");
        env::remove_var("VOWDAY__GATEWAY__CARD__WEBHOOK_SECRET");
        env::remove_var("VOWDAY__GATEWAY__REDIRECT__CLIENT_ID");
        env::remove_var("VOWDAY__GATEWAY__REDIRECT__CLIENT_SECRET");
        env::remove_var("VOWDAY__GATEWAY__REDIRECT__MERCHANT_ID");
        env::remove_var("VOWDAY__GATEWAY__REDIRECT__API_BASE_URL");
        env::remove_var("VOWDAY__GATEWAY__REDIRECT__NOTIFICATION_URL");
        env::remove_var("VOWDAY__BILLING__SUPPLIER_NAME");
        env::remove_var("VOWDAY__BILLING__SUPPLIER_ADDRESS");
        env::remove_var("VOWDAY__BILLING__SUPPLIER_REGISTRATION_NUMBER");
        env::remove_var("VOWDAY__BILLING__SUPPLIER_EMAIL");
        env::remove_var("VOWDAY__SERVER__PORT");
        env::remove_var("VOWDAY__SERVER__ENVIRONMENT");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://test@localhost/vowday");
        assert_eq!(config.gateway.default_provider, "redirect");
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok());
        assert!(result.unwrap().validate().is_ok());
    }

    #[test]
    fn test_server_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("VOWDAY__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().is_production());
    }
}
