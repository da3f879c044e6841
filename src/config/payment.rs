//! Payment callback configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use crate::application::handlers::subscription::MAX_TRIAL_DAYS as MAX_DEFAULT_TRIAL_DAYS;

/// Shortest accepted shared secret.
const MIN_SECRET_LEN: usize = 16;

/// Secrets shared with the payment providers, plus the default trial length.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// HMAC key for the generic JSON webhook
    pub webhook_secret: SecretString,

    /// Key echoed back by the multi-channel callback
    pub anti_phishing_key: SecretString,

    /// Used when a trial start does not name a length
    #[serde(default = "default_trial_days")]
    pub default_trial_days: u32,
}

impl PaymentConfig {
    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_secret("PAYMENT__WEBHOOK_SECRET", &self.webhook_secret)?;
        check_secret("PAYMENT__ANTI_PHISHING_KEY", &self.anti_phishing_key)?;
        if self.default_trial_days > MAX_DEFAULT_TRIAL_DAYS {
            return Err(ValidationError::InvalidTrialDays(MAX_DEFAULT_TRIAL_DAYS));
        }
        Ok(())
    }
}

fn check_secret(name: &'static str, secret: &SecretString) -> Result<(), ValidationError> {
    let len = secret.expose_secret().trim().len();
    if len == 0 {
        return Err(ValidationError::MissingRequired(name));
    }
    if len < MIN_SECRET_LEN {
        return Err(ValidationError::SecretTooShort(name, MIN_SECRET_LEN));
    }
    Ok(())
}

fn default_trial_days() -> u32 {
    14
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str, key: &str) -> PaymentConfig {
        PaymentConfig {
            webhook_secret: SecretString::new(secret.to_string()),
            anti_phishing_key: SecretString::new(key.to_string()),
            default_trial_days: default_trial_days(),
        }
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(config("whsec-0123456789abcdef", "apk-0123456789abcdef")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_validation_missing_secret() {
        assert_eq!(
            config("", "apk-0123456789abcdef").validate(),
            Err(ValidationError::MissingRequired("PAYMENT__WEBHOOK_SECRET"))
        );
    }

    #[test]
    fn test_validation_short_key() {
        assert_eq!(
            config("whsec-0123456789abcdef", "short").validate(),
            Err(ValidationError::SecretTooShort(
                "PAYMENT__ANTI_PHISHING_KEY",
                MIN_SECRET_LEN
            ))
        );
    }

    #[test]
    fn test_validation_trial_days_bound() {
        let mut cfg = config("whsec-0123456789abcdef", "apk-0123456789abcdef");
        cfg.default_trial_days = 400;
        assert_eq!(
            cfg.validate(),
            Err(ValidationError::InvalidTrialDays(MAX_DEFAULT_TRIAL_DAYS))
        );
    }

    #[test]
    fn test_debug_does_not_leak_secrets() {
        let cfg = config("whsec-0123456789abcdef", "apk-0123456789abcdef");
        let rendered = format!("{:?}", cfg);
        assert!(!rendered.contains("0123456789abcdef"));
    }
}
