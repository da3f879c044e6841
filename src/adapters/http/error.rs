//! JSON error responses for the API routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::billing::BillingError;
use crate::domain::foundation::DomainError;

/// Standard error body for JSON endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

/// Wraps a `BillingError` so handlers can return it with `?`.
#[derive(Debug)]
pub struct ApiError(pub BillingError);

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(BillingError::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let message = if self.0.is_user_facing() {
            self.0.to_string()
        } else {
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                tracing::error!(error = %self.0, "request failed");
            }
            generic_message(&self.0).to_string()
        };

        (status, Json(ErrorResponse::new(self.0.code(), message))).into_response()
    }
}

fn generic_message(err: &BillingError) -> &'static str {
    match err {
        BillingError::Unauthorized(_) => "Authentication failed",
        BillingError::Forbidden(_) => "You are not allowed to perform this action",
        _ => "An internal error occurred",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_errors_keep_their_message() {
        let response = ApiError(BillingError::capacity_exceeded("No spare licenses")).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn internal_errors_map_to_500() {
        let response = ApiError(BillingError::internal("pool timed out")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn generic_message_hides_forbidden_detail() {
        assert_eq!(
            generic_message(&BillingError::forbidden("user 7 is not the owner")),
            "You are not allowed to perform this action"
        );
    }
}
