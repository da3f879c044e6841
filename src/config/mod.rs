//! Application configuration module
//!
//! Configuration is loaded from environment variables using the `config` and
//! `dotenvy` crates. Variables carry the `CONDO_BILLING` prefix and nested
//! values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use condo_billing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod payment;
mod server;
mod transfers;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use server::{Environment, LogFormat, ServerConfig};
pub use transfers::TransfersConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Bind address, logging and timeouts
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    /// Provider secrets and billing defaults
    pub payment: PaymentConfig,

    #[serde(default)]
    pub transfers: TransfersConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with the `CONDO_BILLING` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// - `CONDO_BILLING__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `CONDO_BILLING__PAYMENT__WEBHOOK_SECRET=...` -> `payment.webhook_secret`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or cannot be
    /// parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("CONDO_BILLING")
                    .prefix_separator("__")
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
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate()?;
        self.transfers.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[(&str, &str)] = &[
        ("CONDO_BILLING__DATABASE__URL", "postgresql://test@localhost/billing"),
        ("CONDO_BILLING__PAYMENT__WEBHOOK_SECRET", "whsec-0123456789abcdef"),
        ("CONDO_BILLING__PAYMENT__ANTI_PHISHING_KEY", "apk-0123456789abcdef"),
    ];

    fn set_minimal_env() {
        for (name, value) in VARS {
            env::set_var(name, value);
        }
    }

    fn clear_env() {
        for (name, _) in VARS {
            env::remove_var(name);
        }
        env::remove_var("CONDO_BILLING__SERVER__PORT");
        env::remove_var("CONDO_BILLING__SERVER__ENVIRONMENT");
        env::remove_var("CONDO_BILLING__TRANSFERS__PENDING_VIEW_PATH");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(config.database.url, "postgresql://test@localhost/billing");
        assert_eq!(config.payment.default_trial_days, 14);
        assert_eq!(
            config.transfers.pending_view_path,
            "/admin/transfers/pending"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("CONDO_BILLING__SERVER__PORT", "3000");
        env::set_var("CONDO_BILLING__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.is_production());
    }

    #[test]
    fn test_missing_secrets_fail_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("CONDO_BILLING__DATABASE__URL", "postgresql://test@localhost/billing");
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_pending_view_path_fails_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("CONDO_BILLING__TRANSFERS__PENDING_VIEW_PATH", "pending");
        let result = AppConfig::load();
        clear_env();

        assert_eq!(
            result.unwrap().validate(),
            Err(ValidationError::InvalidPendingViewPath)
        );
    }
}
