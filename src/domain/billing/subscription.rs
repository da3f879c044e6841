//! Subscription aggregate.
//!
//! A subscription is a user's billing contract. At most one non-canceled
//! subscription exists per user; canceled rows are kept forever for billing
//! history and can be reactivated.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DomainError, ErrorCode, StateMachine, SubscriptionId, Timestamp, UserId,
};

use super::{Plan, PlanSnapshot, SubscriptionStatus};

/// How a confirmed payment moved the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEffect {
    /// Trialing → Active.
    Activated,
    /// Active → Active, period extended.
    Renewed,
    /// PastDue → Active.
    Recovered,
}

/// Subscription aggregate.
///
/// # Invariants
///
/// - `current_period_start <= current_period_end`
/// - `canceled_at` is set iff status is `Canceled`
/// - `plan` is the contract-time snapshot, never a live catalog reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub plan: PlanSnapshot,
    pub status: SubscriptionStatus,
    pub current_period_start: Timestamp,
    pub current_period_end: Timestamp,
    pub trial_ends_at: Option<Timestamp>,
    pub canceled_at: Option<Timestamp>,

    /// Number of condominium licenses this subscription may hold.
    pub license_count: u32,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Starts a trial. A zero-day trial is a direct signup awaiting payment.
    pub fn start_trial(
        id: SubscriptionId,
        user_id: UserId,
        plan: &Plan,
        trial_days: u32,
        now: Timestamp,
    ) -> Self {
        let trial_ends_at = now.add_days(i64::from(trial_days));
        Self {
            id,
            user_id,
            plan: plan.snapshot(),
            status: SubscriptionStatus::Trialing,
            current_period_start: now,
            current_period_end: trial_ends_at,
            trial_ends_at: Some(trial_ends_at),
            canceled_at: None,
            license_count: plan.included_licenses,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// Recurring charge owed for the next period under the agreed terms.
    pub fn amount_due_cents(&self) -> i64 {
        self.plan.recurring_amount_cents(self.license_count)
    }

    /// Applies a confirmed payment.
    ///
    /// The new period ends one interval after the later of the current
    /// period end and `now`, so early renewals never lose paid days and late
    /// ones never backdate.
    pub fn apply_payment(&mut self, now: Timestamp) -> Result<PaymentEffect, DomainError> {
        let effect = match self.status {
            SubscriptionStatus::Trialing => PaymentEffect::Activated,
            SubscriptionStatus::Active => PaymentEffect::Renewed,
            SubscriptionStatus::PastDue => PaymentEffect::Recovered,
            SubscriptionStatus::Canceled => {
                return Err(self.invalid_transition(SubscriptionStatus::Active))
            }
        };
        self.transition_to(SubscriptionStatus::Active)?;

        let anchor = self.current_period_end.max(now);
        if effect == PaymentEffect::Activated {
            self.current_period_start = now;
        } else {
            self.current_period_start = anchor;
        }
        self.current_period_end = self.plan.billing_interval.advance(anchor);
        self.updated_at = now;
        Ok(effect)
    }

    /// Records a failed renewal payment.
    pub fn mark_past_due(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::PastDue)?;
        self.updated_at = now;
        Ok(())
    }

    /// Moves the contract to a new plan.
    ///
    /// Capacity is reset to the new plan's included allotment. Allocations
    /// above it are left in place.
    pub fn change_plan(&mut self, plan: &Plan, now: Timestamp) -> Result<(), DomainError> {
        if !self.is_live() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot change plan of a {} subscription", self.status),
            ));
        }
        self.plan = plan.snapshot();
        self.license_count = plan.included_licenses;
        self.updated_at = now;
        Ok(())
    }

    /// Cancels the subscription. Licenses are not touched.
    pub fn cancel(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Canceled)?;
        self.canceled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Reactivates a canceled subscription with a fresh billing window.
    pub fn reactivate(&mut self, now: Timestamp) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Canceled {
            return Err(self.invalid_transition(SubscriptionStatus::Active));
        }
        self.transition_to(SubscriptionStatus::Active)?;
        self.current_period_start = now;
        self.current_period_end = self.plan.billing_interval.advance(now);
        self.canceled_at = None;
        self.updated_at = now;
        Ok(())
    }

    fn transition_to(&mut self, target: SubscriptionStatus) -> Result<(), DomainError> {
        self.status = self
            .status
            .transition_to(target)
            .map_err(|_| self.invalid_transition(target))?;
        Ok(())
    }

    fn invalid_transition(&self, target: SubscriptionStatus) -> DomainError {
        DomainError::new(
            ErrorCode::InvalidStateTransition,
            format!(
                "Cannot transition subscription from {} to {}",
                self.status, target
            ),
        )
        .with_detail("subscription_id", self.id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::plan::test_support::plan;
    use chrono::{TimeZone, Utc};

    fn at(y: i32, m: u32, d: u32) -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap())
    }

    fn trial(days: u32, now: Timestamp) -> Subscription {
        Subscription::start_trial(
            SubscriptionId::new(),
            UserId::new(1).unwrap(),
            &plan(1, 2000, 3),
            days,
            now,
        )
    }

    // ══════════════════════════════════════════════════════════════
    // Construction
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn start_trial_sets_trial_window_and_capacity() {
        let now = at(2025, 1, 1);
        let sub = trial(14, now);

        assert_eq!(sub.status, SubscriptionStatus::Trialing);
        assert_eq!(sub.trial_ends_at, Some(now.add_days(14)));
        assert_eq!(sub.current_period_end, now.add_days(14));
        assert_eq!(sub.license_count, 3);
        assert_eq!(sub.plan.price_cents, 2000);
    }

    #[test]
    fn zero_day_trial_is_direct_signup() {
        let now = at(2025, 1, 1);
        let sub = trial(0, now);
        assert_eq!(sub.trial_ends_at, Some(now));
        assert_eq!(sub.status, SubscriptionStatus::Trialing);
    }

    #[test]
    fn oversized_trial_saturates_the_window() {
        let now = at(2025, 1, 1);
        let sub = trial(u32::MAX, now);
        assert!(sub.current_period_end.is_after(&now));
        assert_eq!(sub.trial_ends_at, Some(sub.current_period_end));
    }

    // ══════════════════════════════════════════════════════════════
    // Payments
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn first_payment_activates_and_extends_one_interval() {
        let start = at(2025, 1, 1);
        let mut sub = trial(14, start);
        let paid_at = at(2025, 1, 5);

        let effect = sub.apply_payment(paid_at).unwrap();

        assert_eq!(effect, PaymentEffect::Activated);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.current_period_start, paid_at);
        assert_eq!(sub.current_period_end, at(2025, 2, 15));
    }

    #[test]
    fn renewal_extends_from_period_end_when_early() {
        let mut sub = trial(0, at(2025, 1, 1));
        sub.apply_payment(at(2025, 1, 1)).unwrap();
        assert_eq!(sub.current_period_end, at(2025, 2, 1));

        let effect = sub.apply_payment(at(2025, 1, 20)).unwrap();

        assert_eq!(effect, PaymentEffect::Renewed);
        assert_eq!(sub.current_period_end, at(2025, 3, 1));
    }

    #[test]
    fn late_recovery_extends_from_now() {
        let mut sub = trial(0, at(2025, 1, 1));
        sub.apply_payment(at(2025, 1, 1)).unwrap();
        sub.mark_past_due(at(2025, 2, 2)).unwrap();

        let effect = sub.apply_payment(at(2025, 2, 10)).unwrap();

        assert_eq!(effect, PaymentEffect::Recovered);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.current_period_end, at(2025, 3, 10));
    }

    #[test]
    fn payment_on_canceled_subscription_is_rejected() {
        let mut sub = trial(0, at(2025, 1, 1));
        sub.cancel(at(2025, 1, 2)).unwrap();

        let err = sub.apply_payment(at(2025, 1, 3)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
    }

    #[test]
    fn trialing_cannot_be_marked_past_due() {
        let mut sub = trial(14, at(2025, 1, 1));
        assert!(sub.mark_past_due(at(2025, 1, 2)).is_err());
        assert_eq!(sub.status, SubscriptionStatus::Trialing);
    }

    // ══════════════════════════════════════════════════════════════
    // Plan changes, cancel and reactivate
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn change_plan_resets_capacity_and_snapshot() {
        let mut sub = trial(14, at(2025, 1, 1));
        sub.change_plan(&plan(2, 1000, 1), at(2025, 1, 2)).unwrap();

        assert_eq!(sub.license_count, 1);
        assert_eq!(sub.plan.plan_id.as_i64(), 2);
        assert_eq!(sub.plan.price_cents, 1000);
    }

    #[test]
    fn change_plan_rejected_when_canceled() {
        let mut sub = trial(14, at(2025, 1, 1));
        sub.cancel(at(2025, 1, 2)).unwrap();
        assert!(sub.change_plan(&plan(2, 1000, 1), at(2025, 1, 3)).is_err());
    }

    #[test]
    fn cancel_sets_canceled_at() {
        let mut sub = trial(14, at(2025, 1, 1));
        sub.cancel(at(2025, 1, 3)).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert_eq!(sub.canceled_at, Some(at(2025, 1, 3)));
        assert!(!sub.is_live());
    }

    #[test]
    fn cancel_twice_fails() {
        let mut sub = trial(14, at(2025, 1, 1));
        sub.cancel(at(2025, 1, 3)).unwrap();
        assert!(sub.cancel(at(2025, 1, 4)).is_err());
    }

    #[test]
    fn reactivate_starts_fresh_window() {
        let mut sub = trial(14, at(2025, 1, 1));
        sub.cancel(at(2025, 1, 3)).unwrap();

        sub.reactivate(at(2025, 4, 10)).unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.current_period_start, at(2025, 4, 10));
        assert_eq!(sub.current_period_end, at(2025, 5, 10));
        assert!(sub.canceled_at.is_none());
    }

    #[test]
    fn reactivate_requires_canceled() {
        let mut sub = trial(0, at(2025, 1, 1));
        sub.apply_payment(at(2025, 1, 1)).unwrap();

        let err = sub.reactivate(at(2025, 1, 2)).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    #[test]
    fn amount_due_uses_snapshot_terms() {
        let mut sub = trial(0, at(2025, 1, 1));
        sub.license_count = 4;
        assert_eq!(sub.amount_due_cents(), 3000);
    }
}
