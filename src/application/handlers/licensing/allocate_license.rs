//! AllocateLicenseHandler - Consumes one unit of the user's capacity for a
//! condominium.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::{CondominiumId, Timestamp, UserId};
use crate::domain::licensing::{AllocateOutcome, LicenseAllocation};
use crate::ports::{LicenseRepository, SubscriptionRepository};

#[derive(Debug, Clone)]
pub struct AllocateLicenseCommand {
    pub user_id: UserId,
    pub condominium_id: CondominiumId,
}

pub struct AllocateLicenseHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    licenses: Arc<dyn LicenseRepository>,
}

impl AllocateLicenseHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        licenses: Arc<dyn LicenseRepository>,
    ) -> Self {
        Self {
            subscriptions,
            licenses,
        }
    }

    pub async fn handle(
        &self,
        cmd: AllocateLicenseCommand,
    ) -> Result<LicenseAllocation, BillingError> {
        let subscription = self
            .subscriptions
            .find_live_by_user(&cmd.user_id)
            .await?
            .ok_or_else(|| BillingError::not_found("No active subscription"))?;

        let outcome = self
            .licenses
            .allocate(
                &subscription.id,
                &cmd.condominium_id,
                Some(cmd.user_id),
                Timestamp::now(),
            )
            .await?;

        match outcome {
            AllocateOutcome::Allocated(allocation) => {
                tracing::info!(
                    subscription_id = %subscription.id,
                    condominium_id = %cmd.condominium_id,
                    "license allocated"
                );
                Ok(allocation)
            }
            AllocateOutcome::AlreadyAllocated => Err(BillingError::conflict(format!(
                "Condominium {} already holds an active license",
                cmd.condominium_id
            ))),
            AllocateOutcome::CapacityExceeded {
                active,
                license_count,
            } => Err(BillingError::capacity_exceeded(format!(
                "All {} licenses are in use ({} active)",
                license_count, active
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::{condo, user, Fixture};
    use crate::domain::billing::SubscriptionStatus;

    fn command(condominium: i64) -> AllocateLicenseCommand {
        AllocateLicenseCommand {
            user_id: user(1),
            condominium_id: condo(condominium),
        }
    }

    #[tokio::test]
    async fn allocates_until_capacity() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::Trialing, 1);
        let handler = AllocateLicenseHandler::new(f.store.clone(), f.store.clone());

        let allocation = handler.handle(command(10)).await.unwrap();
        assert_eq!(allocation.subscription_id, sub.id);
        assert_eq!(allocation.assigned_by_user_id, Some(user(1)));

        let err = handler.handle(command(11)).await.unwrap_err();
        assert!(matches!(err, BillingError::CapacityExceeded(_)));
        assert_eq!(f.store.active_allocations(&sub.id), 1);
    }

    #[tokio::test]
    async fn same_condominium_twice_conflicts() {
        let f = Fixture::new();
        f.subscription(1, SubscriptionStatus::Active, 5);
        let handler = AllocateLicenseHandler::new(f.store.clone(), f.store.clone());

        handler.handle(command(10)).await.unwrap();
        let err = handler.handle(command(10)).await.unwrap_err();

        assert!(matches!(err, BillingError::Conflict(_)));
    }

    #[tokio::test]
    async fn without_live_subscription_is_not_found() {
        let f = Fixture::new();
        let handler = AllocateLicenseHandler::new(f.store.clone(), f.store.clone());

        let err = handler.handle(command(10)).await.unwrap_err();

        assert!(matches!(err, BillingError::NotFound(_)));
    }
}
