//! StartTrialHandler - Command handler for opening a subscription.
//!
//! A zero-day trial is a direct signup: the subscription waits in
//! `trialing` for its first confirmed payment.

use std::sync::Arc;

use crate::application::best_effort::{publish_events, StepOutcome};
use crate::domain::billing::{BillingError, Subscription, SubscriptionChange, SubscriptionEvent};
use crate::domain::foundation::{
    PlanId, SerializableDomainEvent, SubscriptionId, Timestamp, UserId,
};
use crate::ports::{EventPublisher, PlanCatalog, SubscriptionRepository};

/// Longest trial the engine will grant.
pub const MAX_TRIAL_DAYS: u32 = 365;

#[derive(Debug, Clone)]
pub struct StartTrialCommand {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub trial_days: u32,
}

#[derive(Debug, Clone)]
pub struct StartTrialResult {
    pub subscription: Subscription,
    pub events: StepOutcome<usize>,
}

pub struct StartTrialHandler {
    plans: Arc<dyn PlanCatalog>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl StartTrialHandler {
    pub fn new(
        plans: Arc<dyn PlanCatalog>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            plans,
            subscriptions,
            event_publisher,
        }
    }

    pub async fn handle(&self, cmd: StartTrialCommand) -> Result<StartTrialResult, BillingError> {
        if cmd.trial_days > MAX_TRIAL_DAYS {
            return Err(BillingError::validation(format!(
                "trial_days must be at most {}",
                MAX_TRIAL_DAYS
            )));
        }

        // 1. Resolve the plan
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

        // 2. Reject a second live subscription
        if self
            .subscriptions
            .find_live_by_user(&cmd.user_id)
            .await?
            .is_some()
        {
            return Err(BillingError::conflict(
                "User already has an active subscription",
            ));
        }

        // 3. Persist; storage uniqueness catches a concurrent start
        let subscription = Subscription::start_trial(
            SubscriptionId::new(),
            cmd.user_id,
            &plan,
            cmd.trial_days,
            Timestamp::now(),
        );
        self.subscriptions.save(&subscription).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            user_id = %subscription.user_id,
            plan = %plan.slug,
            trial_days = cmd.trial_days,
            "subscription trial started"
        );

        // 4. Publish
        let event = SubscriptionEvent::new(SubscriptionChange::TrialStarted, &subscription);
        let envelope = event.to_envelope().with_user_id(cmd.user_id.to_string());
        let events = publish_events(self.event_publisher.as_ref(), vec![envelope]).await;

        Ok(StartTrialResult {
            subscription,
            events,
        })
    }
}
