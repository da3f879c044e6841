//! License allocation port.
//!
//! `allocate` and `transfer` are atomic: the capacity check and the writes
//! it guards run under the same lock, so concurrent calls for the same
//! condominium or destination subscription serialize.

use async_trait::async_trait;

use crate::domain::foundation::{
    CondominiumId, DomainError, SubscriptionId, Timestamp, UserId,
};
use crate::domain::licensing::{AllocateOutcome, LicenseAllocation, LicenseTransfer, TransferOutcome};

#[async_trait]
pub trait LicenseRepository: Send + Sync {
    /// Number of active allocations held by a subscription.
    async fn count_active(&self, subscription_id: &SubscriptionId) -> Result<u32, DomainError>;

    async fn find_active_for_condominium(
        &self,
        condominium_id: &CondominiumId,
    ) -> Result<Option<LicenseAllocation>, DomainError>;

    /// Consume one unit of capacity for a condominium.
    ///
    /// Capacity is read from the subscription's `license_count` inside the
    /// same unit of work.
    async fn allocate(
        &self,
        subscription_id: &SubscriptionId,
        condominium_id: &CondominiumId,
        assigned_by: Option<UserId>,
        now: Timestamp,
    ) -> Result<AllocateOutcome, DomainError>;

    /// Release the condominium's active allocation, if any.
    async fn release(
        &self,
        condominium_id: &CondominiumId,
        now: Timestamp,
    ) -> Result<Option<LicenseAllocation>, DomainError>;

    /// Move the condominium's allocation between subscriptions.
    ///
    /// Either the release and the create both happen or neither does.
    async fn transfer(
        &self,
        transfer: &LicenseTransfer,
        now: Timestamp,
    ) -> Result<TransferOutcome, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn license_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn LicenseRepository) {}
    }
}
