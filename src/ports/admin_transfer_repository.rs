//! Admin transfer repository port.
//!
//! Accepting a transfer is the workflow's primary step: the status change
//! and the role assignment are committed together or not at all.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, TransferId, UserId};
use crate::domain::transfer::{AdminTransferPending, NewAdminTransfer};

#[async_trait]
pub trait AdminTransferRepository: Send + Sync {
    /// Create a pending transfer and return it with its assigned id.
    async fn create(&self, transfer: &NewAdminTransfer)
        -> Result<AdminTransferPending, DomainError>;

    async fn find_by_id(&self, id: &TransferId)
        -> Result<Option<AdminTransferPending>, DomainError>;

    /// Pending transfers addressed to `user_id`, oldest first.
    async fn list_pending_for(&self, user_id: &UserId)
        -> Result<Vec<AdminTransferPending>, DomainError>;

    /// Mark accepted (only if still pending) and grant the invitee the admin
    /// role on the condominium, in one transaction.
    ///
    /// # Errors
    ///
    /// - `AlreadyProcessed` if the transfer was decided concurrently
    /// - `DatabaseError` on persistence failure (nothing is committed)
    async fn commit_acceptance(&self, transfer: &AdminTransferPending) -> Result<(), DomainError>;

    /// Mark rejected, only if still pending.
    ///
    /// # Errors
    ///
    /// - `AlreadyProcessed` if the transfer was decided concurrently
    async fn commit_rejection(&self, transfer: &AdminTransferPending) -> Result<(), DomainError>;
}
