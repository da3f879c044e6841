//! Callback validation and normalization errors.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::billing::BillingError;

/// Errors raised before an event reaches the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// HMAC signature header missing or wrong.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Anti-phishing key missing or wrong.
    #[error("Invalid anti-phishing key")]
    InvalidKey,

    /// Body or query string could not be parsed.
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// None of the known method field groups matched.
    #[error("Unable to identify payment type")]
    UnrecognizedCallback,
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature | WebhookError::InvalidKey => StatusCode::UNAUTHORIZED,
            WebhookError::ParseError(_)
            | WebhookError::MissingField(_)
            | WebhookError::UnrecognizedCallback => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<WebhookError> for BillingError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::InvalidSignature | WebhookError::InvalidKey => {
                BillingError::Unauthorized(err.to_string())
            }
            WebhookError::UnrecognizedCallback => BillingError::UnrecognizedCallback,
            WebhookError::ParseError(_) | WebhookError::MissingField(_) => {
                BillingError::Validation(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_401() {
        assert_eq!(WebhookError::InvalidSignature.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(WebhookError::InvalidKey.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn malformed_input_is_400() {
        assert_eq!(
            WebhookError::MissingField("status").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::UnrecognizedCallback.status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn missing_field_displays_field_name() {
        assert_eq!(
            WebhookError::MissingField("payment_id").to_string(),
            "Missing field: payment_id"
        );
    }

    #[test]
    fn converts_into_billing_taxonomy() {
        assert_eq!(
            BillingError::from(WebhookError::UnrecognizedCallback),
            BillingError::UnrecognizedCallback
        );
        assert!(matches!(
            BillingError::from(WebhookError::InvalidKey),
            BillingError::Unauthorized(_)
        ));
    }
}
