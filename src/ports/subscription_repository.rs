//! Subscription repository port.
//!
//! Implementations must enforce at most one non-canceled subscription per
//! user, at the storage level, so that concurrent trial starts cannot both
//! succeed.

use async_trait::async_trait;

use crate::domain::billing::Subscription;
use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp, UserId};

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Save a new subscription.
    ///
    /// # Errors
    ///
    /// - `SubscriptionExists` if the user already has a live subscription
    /// - `DatabaseError` on persistence failure
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Update an existing subscription, provided the stored row still
    /// carries `expected_updated_at`.
    ///
    /// # Errors
    ///
    /// - `SubscriptionNotFound` if it doesn't exist
    /// - `ConcurrentModification` if it was written since it was loaded
    /// - `SubscriptionExists` if the update would make a second live
    ///   subscription for the user (reactivation)
    /// - `DatabaseError` on persistence failure
    async fn update(
        &self,
        subscription: &Subscription,
        expected_updated_at: Timestamp,
    ) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    /// Find the user's non-canceled subscription.
    async fn find_live_by_user(&self, user_id: &UserId)
        -> Result<Option<Subscription>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn SubscriptionRepository) {}
    }
}
