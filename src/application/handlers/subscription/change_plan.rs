//! ChangePlanHandler - Command handler for plan changes and upgrades.
//!
//! Capacity is reset to the new plan's included licenses. When that is
//! below the number of active allocations the excess is left in place and
//! reported back to the caller.

use std::sync::Arc;

use serde::Serialize;

use crate::application::best_effort::{publish_events, StepOutcome};
use crate::domain::billing::{BillingError, Subscription, SubscriptionChange, SubscriptionEvent};
use crate::domain::foundation::{PlanId, SerializableDomainEvent, Timestamp, UserId};
use crate::ports::{EventPublisher, LicenseRepository, PlanCatalog, SubscriptionRepository};

use super::cancel_subscription::retryable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanChangeMode {
    /// Any active plan.
    Change,
    /// Only a plan priced above the current terms.
    Upgrade,
}

#[derive(Debug, Clone)]
pub struct ChangePlanCommand {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub mode: PlanChangeMode,
}

#[derive(Debug, Clone)]
pub struct ChangePlanResult {
    pub subscription: Subscription,
    pub previous_plan_id: PlanId,

    /// Active allocations above the new capacity.
    pub excess_allocations: u32,

    pub events: StepOutcome<usize>,
}

pub struct ChangePlanHandler {
    plans: Arc<dyn PlanCatalog>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    licenses: Arc<dyn LicenseRepository>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl ChangePlanHandler {
    pub fn new(
        plans: Arc<dyn PlanCatalog>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        licenses: Arc<dyn LicenseRepository>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            plans,
            subscriptions,
            licenses,
            event_publisher,
        }
    }

    pub async fn handle(&self, cmd: ChangePlanCommand) -> Result<ChangePlanResult, BillingError> {
        // 1. Resolve the target plan
        let plan = self
            .plans
            .find_by_id(&cmd.plan_id)
            .await?
            .ok_or_else(|| BillingError::not_found(format!("Plan {} not found", cmd.plan_id)))?;
        if !plan.active {
            return Err(BillingError::validation(format!(
                "Plan {} is not available",
                plan.slug
            )));
        }

        let mut attempt = 1;
        let (subscription, previous_plan_id) = loop {
            // 2. Load the live subscription and vet the change against it
            let mut subscription = self
                .subscriptions
                .find_live_by_user(&cmd.user_id)
                .await?
                .ok_or_else(|| BillingError::not_found("No active subscription"))?;
            let previous_plan_id = subscription.plan.plan_id;
            if plan.id == previous_plan_id {
                return Err(BillingError::validation("Subscription is already on this plan"));
            }
            if cmd.mode == PlanChangeMode::Upgrade
                && plan.price_cents <= subscription.plan.price_cents
            {
                return Err(BillingError::validation(format!(
                    "Plan {} is not an upgrade",
                    plan.slug
                )));
            }

            // 3. Apply and persist against the version just read
            let expected_updated_at = subscription.updated_at;
            subscription.change_plan(&plan, Timestamp::now())?;
            match self.subscriptions.update(&subscription, expected_updated_at).await {
                Ok(()) => break (subscription, previous_plan_id),
                Err(err) if retryable(&err, attempt) => {
                    tracing::debug!(
                        subscription_id = %subscription.id,
                        attempt,
                        "subscription changed during plan change, retrying"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        };

        // 4. Report allocations above the new capacity
        let active = self.licenses.count_active(&subscription.id).await?;
        let excess_allocations = active.saturating_sub(subscription.license_count);
        if excess_allocations > 0 {
            tracing::warn!(
                subscription_id = %subscription.id,
                active,
                license_count = subscription.license_count,
                "plan change left allocations above capacity"
            );
        }

        tracing::info!(
            subscription_id = %subscription.id,
            from_plan = %previous_plan_id,
            to_plan = %plan.id,
            mode = ?cmd.mode,
            "subscription plan changed"
        );

        // 5. Publish
        let event = SubscriptionEvent::new(SubscriptionChange::PlanChanged, &subscription);
        let envelope = event.to_envelope().with_user_id(cmd.user_id.to_string());
        let events = publish_events(self.event_publisher.as_ref(), vec![envelope]).await;

        Ok(ChangePlanResult {
            subscription,
            previous_plan_id,
            excess_allocations,
            events,
        })
    }
}
