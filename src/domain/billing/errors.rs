//! Billing error taxonomy shared by every application handler.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Validation | 400 |
//! | UnrecognizedCallback | 400 |
//! | Unauthorized | 401 |
//! | Forbidden | 403 |
//! | NotFound | 404 |
//! | Conflict | 409 |
//! | InvalidState | 409 |
//! | AlreadyProcessed | 409 |
//! | CapacityExceeded | 409 |
//! | Internal | 500 |

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Errors surfaced by subscription, licensing, payment and transfer operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    /// Shared secret or signature check failed.
    #[error("{0}")]
    Unauthorized(String),

    /// Caller is not allowed to act on the resource (includes CSRF failures).
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation, e.g. a second live subscription.
    #[error("{0}")]
    Conflict(String),

    /// Illegal state transition.
    #[error("{0}")]
    InvalidState(String),

    /// The record already reached a terminal state.
    #[error("{0}")]
    AlreadyProcessed(String),

    #[error("{0}")]
    CapacityExceeded(String),

    /// No known callback field group matched.
    #[error("Unable to identify payment type")]
    UnrecognizedCallback,

    /// Persistence or unexpected failure.
    #[error("{0}")]
    Internal(String),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        BillingError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        BillingError::Conflict(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        BillingError::InvalidState(message.into())
    }

    pub fn already_processed(message: impl Into<String>) -> Self {
        BillingError::AlreadyProcessed(message.into())
    }

    pub fn capacity_exceeded(message: impl Into<String>) -> Self {
        BillingError::CapacityExceeded(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        BillingError::Forbidden(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        BillingError::Internal(message.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::Validation(_) => "VALIDATION_FAILED",
            BillingError::Unauthorized(_) => "UNAUTHORIZED",
            BillingError::Forbidden(_) => "FORBIDDEN",
            BillingError::NotFound(_) => "NOT_FOUND",
            BillingError::Conflict(_) => "CONFLICT",
            BillingError::InvalidState(_) => "INVALID_STATE",
            BillingError::AlreadyProcessed(_) => "ALREADY_PROCESSED",
            BillingError::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            BillingError::UnrecognizedCallback => "UNRECOGNIZED_CALLBACK",
            BillingError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::Validation(_) | BillingError::UnrecognizedCallback => {
                StatusCode::BAD_REQUEST
            }
            BillingError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BillingError::Forbidden(_) => StatusCode::FORBIDDEN,
            BillingError::NotFound(_) => StatusCode::NOT_FOUND,
            BillingError::Conflict(_)
            | BillingError::InvalidState(_)
            | BillingError::AlreadyProcessed(_)
            | BillingError::CapacityExceeded(_) => StatusCode::CONFLICT,
            BillingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the message may be shown to an end user verbatim.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            BillingError::Internal(_) | BillingError::Unauthorized(_) | BillingError::Forbidden(_)
        )
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => BillingError::Validation(err.message),
            ErrorCode::SubscriptionNotFound
            | ErrorCode::PlanNotFound
            | ErrorCode::PaymentNotFound
            | ErrorCode::TransferNotFound
            | ErrorCode::AllocationNotFound => BillingError::NotFound(err.message),
            ErrorCode::SubscriptionExists
            | ErrorCode::AllocationExists
            | ErrorCode::ConcurrentModification => {
                BillingError::Conflict(err.message)
            }
            ErrorCode::InvalidStateTransition => BillingError::InvalidState(err.message),
            ErrorCode::AlreadyProcessed => BillingError::AlreadyProcessed(err.message),
            ErrorCode::CapacityExceeded => BillingError::CapacityExceeded(err.message),
            ErrorCode::Unauthorized => BillingError::Unauthorized(err.message),
            ErrorCode::Forbidden => BillingError::Forbidden(err.message),
            ErrorCode::DatabaseError
            | ErrorCode::CollaboratorUnavailable
            | ErrorCode::InternalError => BillingError::Internal(err.to_string()),
        }
    }
}

impl From<ValidationError> for BillingError {
    fn from(err: ValidationError) -> Self {
        BillingError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_callback_has_fixed_message() {
        assert_eq!(
            BillingError::UnrecognizedCallback.to_string(),
            "Unable to identify payment type"
        );
        assert_eq!(
            BillingError::UnrecognizedCallback.status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn domain_not_found_codes_map_to_not_found() {
        let err: BillingError =
            DomainError::new(ErrorCode::PaymentNotFound, "Payment not found").into();
        assert_eq!(err, BillingError::NotFound("Payment not found".to_string()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn database_errors_become_internal() {
        let err: BillingError = DomainError::database("connection reset").into();
        assert!(matches!(err, BillingError::Internal(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.is_user_facing());
    }

    #[test]
    fn capacity_exceeded_is_user_facing_conflict() {
        let err: BillingError =
            DomainError::new(ErrorCode::CapacityExceeded, "No spare license").into();
        assert_eq!(err.code(), "CAPACITY_EXCEEDED");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.is_user_facing());
    }

    #[test]
    fn validation_error_converts() {
        let err: BillingError = ValidationError::empty_field("transfer_id").into();
        assert!(matches!(err, BillingError::Validation(ref m) if m.contains("transfer_id")));
    }
}
