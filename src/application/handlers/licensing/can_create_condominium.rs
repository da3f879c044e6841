//! CanCreateCondominiumHandler - Capacity query for the condominium
//! creation flow.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::UserId;
use crate::ports::{LicenseRepository, SubscriptionRepository};

#[derive(Debug, Clone)]
pub struct CanCreateCondominiumQuery {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanCreateCondominiumResult {
    pub allowed: bool,
    pub active: u32,
    pub license_count: u32,
}

pub struct CanCreateCondominiumHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    licenses: Arc<dyn LicenseRepository>,
}

impl CanCreateCondominiumHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        licenses: Arc<dyn LicenseRepository>,
    ) -> Self {
        Self {
            subscriptions,
            licenses,
        }
    }

    /// True iff the user's live subscription has spare capacity.
    pub async fn handle(
        &self,
        query: CanCreateCondominiumQuery,
    ) -> Result<CanCreateCondominiumResult, BillingError> {
        let Some(subscription) = self.subscriptions.find_live_by_user(&query.user_id).await?
        else {
            return Ok(CanCreateCondominiumResult {
                allowed: false,
                active: 0,
                license_count: 0,
            });
        };

        let active = self.licenses.count_active(&subscription.id).await?;
        Ok(CanCreateCondominiumResult {
            allowed: active < subscription.license_count,
            active,
            license_count: subscription.license_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::{condo, user, Fixture};
    use crate::domain::billing::SubscriptionStatus;
    use crate::domain::foundation::Timestamp;
    use crate::domain::licensing::LicenseAllocation;

    async fn allowed(f: &Fixture, user_id: i64) -> bool {
        CanCreateCondominiumHandler::new(f.store.clone(), f.store.clone())
            .handle(CanCreateCondominiumQuery {
                user_id: user(user_id),
            })
            .await
            .unwrap()
            .allowed
    }

    #[tokio::test]
    async fn allowed_below_capacity_denied_at_capacity() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::Active, 2);
        let assign = |id| LicenseAllocation::assign(sub.id, condo(id), None, false, Timestamp::now());

        f.store.seed_allocation(assign(10));
        assert!(allowed(&f, 1).await);

        f.store.seed_allocation(assign(11));
        assert!(!allowed(&f, 1).await);
    }

    #[tokio::test]
    async fn released_allocations_free_capacity() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::Active, 1);
        let mut released =
            LicenseAllocation::assign(sub.id, condo(10), None, false, Timestamp::now());
        released.release(Timestamp::now()).unwrap();
        f.store.seed_allocation(released);

        assert!(allowed(&f, 1).await);
    }

    #[tokio::test]
    async fn no_live_subscription_means_no_capacity() {
        let f = Fixture::new();
        f.subscription(1, SubscriptionStatus::Canceled, 5);

        assert!(!allowed(&f, 1).await);
        assert!(!allowed(&f, 2).await);
    }
}
