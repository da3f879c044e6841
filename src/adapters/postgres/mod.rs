//! PostgreSQL adapters - Database implementations for the billing ports.
//!
//! - `PostgresPlanCatalog` - Read-only plan lookup
//! - `PostgresSubscriptionRepository` - Subscriptions with the one-live-per-user index
//! - `PostgresPaymentLedger` - Payments and the settlement transaction
//! - `PostgresLicenseRepository` - Allocations with row-locked allocate/transfer
//! - `PostgresAdminTransferRepository` - Pending transfers and the acceptance transaction
//! - `PostgresAdminRoleDirectory` - Condominium owners and admins
//!
//! Schema lives in `migrations/`.

mod admin_role_directory;
mod admin_transfer_repository;
mod license_repository;
mod payment_ledger;
mod plan_catalog;
mod subscription_repository;

pub use admin_role_directory::PostgresAdminRoleDirectory;
pub use admin_transfer_repository::PostgresAdminTransferRepository;
pub use license_repository::PostgresLicenseRepository;
pub use payment_ledger::PostgresPaymentLedger;
pub use plan_catalog::PostgresPlanCatalog;
pub use subscription_repository::PostgresSubscriptionRepository;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Wraps a sqlx error with what was being attempted.
fn database_error(action: &str, err: sqlx::Error) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Failed to {}: {}", action, err),
    )
}

/// True when `err` violates the named unique constraint or index.
fn violates(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint() == Some(constraint),
        _ => false,
    }
}

/// A stored value that does not map back onto the domain.
fn corrupt(field: &str, value: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid {} value in database: {}", field, value),
    )
}

fn count_to_db(field: &str, value: u32) -> Result<i32, DomainError> {
    i32::try_from(value).map_err(|_| {
        DomainError::validation(field, format!("{} is too large to store", value))
    })
}

fn count_from_db(field: &str, value: i64) -> Result<u32, DomainError> {
    u32::try_from(value).map_err(|_| corrupt(field, value))
}
