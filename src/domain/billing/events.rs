//! Subscription lifecycle events.
//!
//! One event per transition, named in past tense. Published best-effort
//! after the transition has been committed.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DomainEvent, EventId, PlanId, SubscriptionId, Timestamp, UserId,
};

use super::{PaymentEffect, Subscription, SubscriptionStatus};

/// What happened to the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionChange {
    TrialStarted,
    Activated,
    Renewed,
    PastDue,
    Canceled,
    Reactivated,
    PlanChanged,
}

impl SubscriptionChange {
    pub fn event_type(&self) -> &'static str {
        match self {
            SubscriptionChange::TrialStarted => "subscription.trial_started.v1",
            SubscriptionChange::Activated => "subscription.activated.v1",
            SubscriptionChange::Renewed => "subscription.renewed.v1",
            SubscriptionChange::PastDue => "subscription.past_due.v1",
            SubscriptionChange::Canceled => "subscription.canceled.v1",
            SubscriptionChange::Reactivated => "subscription.reactivated.v1",
            SubscriptionChange::PlanChanged => "subscription.plan_changed.v1",
        }
    }
}

impl From<PaymentEffect> for SubscriptionChange {
    fn from(effect: PaymentEffect) -> Self {
        match effect {
            PaymentEffect::Activated => SubscriptionChange::Activated,
            // A recovery is a renewal from the notification point of view.
            PaymentEffect::Renewed | PaymentEffect::Recovered => SubscriptionChange::Renewed,
        }
    }
}

/// Snapshot of a subscription right after a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    pub event_id: EventId,
    pub change: SubscriptionChange,
    pub subscription_id: SubscriptionId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,
    pub license_count: u32,
    pub current_period_end: Timestamp,
    pub occurred_at: Timestamp,
}

impl SubscriptionEvent {
    pub fn new(change: SubscriptionChange, subscription: &Subscription) -> Self {
        Self {
            event_id: EventId::new(),
            change,
            subscription_id: subscription.id,
            user_id: subscription.user_id,
            plan_id: subscription.plan.plan_id,
            status: subscription.status,
            license_count: subscription.license_count,
            current_period_end: subscription.current_period_end,
            occurred_at: subscription.updated_at,
        }
    }
}

impl DomainEvent for SubscriptionEvent {
    fn event_type(&self) -> &'static str {
        self.change.event_type()
    }

    fn aggregate_id(&self) -> String {
        self.subscription_id.to_string()
    }

    fn aggregate_type(&self) -> &'static str {
        "Subscription"
    }

    fn occurred_at(&self) -> Timestamp {
        self.occurred_at
    }

    fn event_id(&self) -> EventId {
        self.event_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::plan::test_support::plan;
    use crate::domain::foundation::SerializableDomainEvent;

    #[test]
    fn event_types_are_namespaced() {
        for change in [
            SubscriptionChange::TrialStarted,
            SubscriptionChange::Activated,
            SubscriptionChange::Renewed,
            SubscriptionChange::PastDue,
            SubscriptionChange::Canceled,
            SubscriptionChange::Reactivated,
            SubscriptionChange::PlanChanged,
        ] {
            assert!(change.event_type().starts_with("subscription."));
            assert!(change.event_type().ends_with(".v1"));
        }
    }

    #[test]
    fn payment_effects_map_to_changes() {
        assert_eq!(
            SubscriptionChange::from(PaymentEffect::Activated),
            SubscriptionChange::Activated
        );
        assert_eq!(
            SubscriptionChange::from(PaymentEffect::Recovered),
            SubscriptionChange::Renewed
        );
    }

    #[test]
    fn envelope_carries_subscription_state() {
        let sub = Subscription::start_trial(
            SubscriptionId::new(),
            UserId::new(5).unwrap(),
            &plan(1, 2000, 3),
            14,
            Timestamp::now(),
        );

        let envelope = SubscriptionEvent::new(SubscriptionChange::TrialStarted, &sub).to_envelope();

        assert_eq!(envelope.event_type, "subscription.trial_started.v1");
        assert_eq!(envelope.aggregate_type, "Subscription");
        assert_eq!(envelope.aggregate_id, sub.id.to_string());
        assert_eq!(envelope.payload["status"], "trialing");
        assert_eq!(envelope.payload["user_id"], 5);
    }
}
