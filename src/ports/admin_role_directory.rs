//! Admin role directory port.
//!
//! Who owns and who administers each condominium. Owned by the surrounding
//! application; this engine reads it and demotes superseded admins.

use async_trait::async_trait;

use crate::domain::foundation::{CondominiumId, DomainError, UserId};

#[async_trait]
pub trait AdminRoleDirectory: Send + Sync {
    /// Original owner of the condominium. Owners are never demoted.
    async fn owner_of(&self, condominium_id: &CondominiumId)
        -> Result<Option<UserId>, DomainError>;

    async fn is_admin(
        &self,
        user_id: &UserId,
        condominium_id: &CondominiumId,
    ) -> Result<bool, DomainError>;

    /// Remove the admin role. Returns false if the user was not an admin.
    async fn revoke_admin(
        &self,
        user_id: &UserId,
        condominium_id: &CondominiumId,
    ) -> Result<bool, DomainError>;
}
