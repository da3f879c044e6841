//! Shared fixtures for handler tests.

use std::sync::Arc;

use crate::adapters::events::InMemoryEventBus;
use crate::adapters::memory::InMemoryBillingStore;
use crate::adapters::notifications::InMemoryNotifier;
use crate::domain::billing::plan::test_support::plan;
use crate::domain::billing::{Plan, Subscription, SubscriptionStatus};
use crate::domain::foundation::{CondominiumId, DomainError, SubscriptionId, Timestamp, UserId};
use crate::ports::SubscriptionRepository;

pub fn user(id: i64) -> UserId {
    UserId::new(id).unwrap()
}

pub fn condo(id: i64) -> CondominiumId {
    CondominiumId::new(id).unwrap()
}

pub struct Fixture {
    pub store: Arc<InMemoryBillingStore>,
    pub bus: Arc<InMemoryEventBus>,
    pub notifier: Arc<InMemoryNotifier>,
}

impl Fixture {
    /// Store seeded with plan 1 (2000, 1 license), plan 2 (5000, 3 licenses)
    /// and an inactive plan 3.
    pub fn new() -> Self {
        let store = InMemoryBillingStore::new();
        store.seed_plan(plan(1, 2000, 1));
        store.seed_plan(plan(2, 5000, 3));
        store.seed_plan(Plan {
            active: false,
            ..plan(3, 9000, 10)
        });
        Self {
            store: Arc::new(store),
            bus: Arc::new(InMemoryEventBus::new()),
            notifier: Arc::new(InMemoryNotifier::new()),
        }
    }

    /// Seeds a subscription for `user_id` on plan 1 with the given status
    /// and capacity.
    pub fn subscription(
        &self,
        user_id: i64,
        status: SubscriptionStatus,
        license_count: u32,
    ) -> Subscription {
        let now = Timestamp::now();
        let mut sub =
            Subscription::start_trial(SubscriptionId::new(), user(user_id), &plan(1, 2000, 1), 0, now);
        match status {
            SubscriptionStatus::Trialing => {}
            SubscriptionStatus::Active => {
                sub.apply_payment(now).unwrap();
            }
            SubscriptionStatus::PastDue => {
                sub.apply_payment(now).unwrap();
                sub.mark_past_due(now).unwrap();
            }
            SubscriptionStatus::Canceled => {
                sub.cancel(now).unwrap();
            }
        }
        sub.license_count = license_count;
        self.store.seed_subscription(sub.clone());
        sub
    }
}

/// Subscription repository that lets another writer land between the
/// first load and the caller's update.
pub struct RacingSubscriptions {
    store: Arc<InMemoryBillingStore>,
    interloper: std::sync::Mutex<Option<Box<dyn FnOnce(&mut Subscription) + Send>>>,
}

impl RacingSubscriptions {
    pub fn new(
        store: Arc<InMemoryBillingStore>,
        interloper: impl FnOnce(&mut Subscription) + Send + 'static,
    ) -> Self {
        Self {
            store,
            interloper: std::sync::Mutex::new(Some(Box::new(interloper))),
        }
    }

    fn race(&self, loaded: &Option<Subscription>) {
        let Some(loaded) = loaded else { return };
        let interloper = self.interloper.lock().unwrap().take();
        if let Some(interloper) = interloper {
            let mut concurrent = loaded.clone();
            interloper(&mut concurrent);
            self.store.seed_subscription(concurrent);
        }
    }
}

#[async_trait::async_trait]
impl SubscriptionRepository for RacingSubscriptions {
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        SubscriptionRepository::save(self.store.as_ref(), subscription).await
    }

    async fn update(
        &self,
        subscription: &Subscription,
        expected_updated_at: Timestamp,
    ) -> Result<(), DomainError> {
        SubscriptionRepository::update(self.store.as_ref(), subscription, expected_updated_at).await
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let loaded = SubscriptionRepository::find_by_id(self.store.as_ref(), id).await?;
        self.race(&loaded);
        Ok(loaded)
    }

    async fn find_live_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        let loaded = SubscriptionRepository::find_live_by_user(self.store.as_ref(), user_id).await?;
        self.race(&loaded);
        Ok(loaded)
    }
}
