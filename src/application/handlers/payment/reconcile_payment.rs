//! ReconcilePaymentHandler - Applies a canonical payment event.
//!
//! # Guarantees
//!
//! - Never creates a payment; an unmatched event is `NotFound`
//! - A terminal payment is never changed again; later events for it are
//!   acknowledged as already processed, whatever their status
//! - The payment and its subscription are written in one settlement; a
//!   concurrent subscription change makes the settlement retry against
//!   fresh state
//! - Events are published after the settlement and may fail on their own

use std::sync::Arc;

use serde::Serialize;

use crate::application::best_effort::{publish_events, StepOutcome};
use crate::domain::billing::{
    BillingError, PaymentEffect, Subscription, SubscriptionChange, SubscriptionEvent,
    SubscriptionStatus,
};
use crate::domain::foundation::{
    EventEnvelope, EventId, PaymentId, SerializableDomainEvent, Timestamp,
};
use crate::domain::payment::{
    Payment, PaymentConfirmed, PaymentEvent, PaymentFailed, PaymentStatus, Reconciliation,
};
use crate::ports::{
    EventPublisher, PaymentLedger, SettleOutcome, SubscriptionRepository, SubscriptionWrite,
};

/// Settlement attempts before giving up on a contended subscription.
const MAX_SETTLE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct ReconcilePaymentCommand {
    pub event: PaymentEvent,

    /// Request id of the callback, carried into published events.
    pub correlation_id: Option<String>,
}

/// What the event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Payment completed. `effect` is `None` when the subscription was
    /// canceled and left untouched.
    Completed { effect: Option<PaymentEffect> },

    /// Payment failed. `marked_past_due` tells whether the subscription
    /// lapsed.
    Failed { marked_past_due: bool },

    /// The payment was already terminal.
    AlreadyProcessed { status: PaymentStatus },

    /// Pending or unknown provider status; nothing changed.
    Acknowledged,
}

#[derive(Debug, Clone)]
pub struct ReconcilePaymentResult {
    pub payment_id: PaymentId,
    pub outcome: ReconcileOutcome,
    pub events: StepOutcome<usize>,
}

pub struct ReconcilePaymentHandler {
    ledger: Arc<dyn PaymentLedger>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    event_publisher: Arc<dyn EventPublisher>,
}

/// A settlement ready to be written.
struct Settlement {
    payment: Payment,
    subscription: Option<Subscription>,
    expected_updated_at: Timestamp,
    outcome: ReconcileOutcome,
}

impl ReconcilePaymentHandler {
    pub fn new(
        ledger: Arc<dyn PaymentLedger>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            ledger,
            subscriptions,
            event_publisher,
        }
    }

    pub async fn handle(
        &self,
        cmd: ReconcilePaymentCommand,
    ) -> Result<ReconcilePaymentResult, BillingError> {
        let event = cmd.event;
        let correlation_id = cmd.correlation_id;

        // 1. Resolve the payment by lookup precedence
        let mut payment = self.resolve(&event).await?;
        let payment_id = payment.id;

        for attempt in 1..=MAX_SETTLE_ATTEMPTS {
            // 2. Idempotency gate
            let settlement = match Reconciliation::decide(payment.status, event.status) {
                Reconciliation::AlreadyProcessed => {
                    return Ok(self.already_processed(payment_id, payment.status));
                }
                Reconciliation::Acknowledge => {
                    tracing::info!(
                        payment_id = %payment_id,
                        raw_status = %event.raw_status,
                        "payment event acknowledged without change"
                    );
                    return Ok(ReconcilePaymentResult {
                        payment_id,
                        outcome: ReconcileOutcome::Acknowledged,
                        events: StepOutcome::skipped("no state change"),
                    });
                }
                // 3. Completed
                Reconciliation::Complete => self.prepare_completion(&payment, &event).await?,
                // 4. Failed
                Reconciliation::Fail => self.prepare_failure(&payment, &event).await?,
            };

            // 5. Settle payment and subscription together
            let write = settlement.subscription.as_ref().map(|subscription| SubscriptionWrite {
                subscription,
                expected_updated_at: settlement.expected_updated_at,
            });
            match self.ledger.settle(&settlement.payment, write).await? {
                SettleOutcome::Applied => {
                    tracing::info!(
                        payment_id = %payment_id,
                        subscription_id = %settlement.payment.subscription_id,
                        outcome = ?settlement.outcome,
                        "payment reconciled"
                    );
                    let envelopes = settlement_events(&settlement, correlation_id.as_deref());
                    let events = publish_events(self.event_publisher.as_ref(), envelopes).await;
                    return Ok(ReconcilePaymentResult {
                        payment_id,
                        outcome: settlement.outcome,
                        events,
                    });
                }
                SettleOutcome::AlreadySettled(status) => {
                    return Ok(self.already_processed(payment_id, status));
                }
                SettleOutcome::SubscriptionChanged => {
                    tracing::debug!(
                        payment_id = %payment_id,
                        attempt,
                        "subscription changed during settlement, retrying"
                    );
                    payment = self
                        .ledger
                        .find_by_id(&payment_id)
                        .await?
                        .ok_or_else(|| BillingError::not_found("Payment not found"))?;
                }
            }
        }

        tracing::error!(
            payment_id = %payment_id,
            attempts = MAX_SETTLE_ATTEMPTS,
            "payment settlement kept conflicting with subscription updates"
        );
        Err(BillingError::internal(
            "Subscription changed concurrently; settlement not applied",
        ))
    }

    async fn resolve(&self, event: &PaymentEvent) -> Result<Payment, BillingError> {
        let keys = event.lookup_keys();
        if keys.is_empty() {
            return Err(BillingError::validation("Missing payment identifier"));
        }
        for key in &keys {
            if let Some(payment) = self.ledger.find_by(key).await? {
                return Ok(payment);
            }
        }
        tracing::warn!(
            request_id = ?event.request_id,
            order_id = ?event.order_id,
            external_payment_id = ?event.external_payment_id,
            "payment event matched no payment"
        );
        Err(BillingError::not_found("Payment not found"))
    }

    async fn load_subscription(&self, payment: &Payment) -> Result<Subscription, BillingError> {
        self.subscriptions
            .find_by_id(&payment.subscription_id)
            .await?
            .ok_or_else(|| {
                BillingError::internal(format!(
                    "Payment {} references missing subscription {}",
                    payment.id, payment.subscription_id
                ))
            })
    }

    async fn prepare_completion(
        &self,
        payment: &Payment,
        event: &PaymentEvent,
    ) -> Result<Settlement, BillingError> {
        let now = Timestamp::now();
        let mut subscription = self.load_subscription(payment).await?;
        let expected_updated_at = subscription.updated_at;

        let mut payment = payment.clone();
        payment.note_method(event.method);
        payment.complete(event.raw_payload.clone(), now)?;

        // A canceled contract keeps the money but is not revived by it
        let effect = if subscription.status == SubscriptionStatus::Canceled {
            tracing::warn!(
                payment_id = %payment.id,
                subscription_id = %subscription.id,
                "payment completed for canceled subscription; subscription left unchanged"
            );
            None
        } else {
            Some(subscription.apply_payment(now)?)
        };

        Ok(Settlement {
            payment,
            subscription: effect.map(|_| subscription),
            expected_updated_at,
            outcome: ReconcileOutcome::Completed { effect },
        })
    }

    async fn prepare_failure(
        &self,
        payment: &Payment,
        event: &PaymentEvent,
    ) -> Result<Settlement, BillingError> {
        let now = Timestamp::now();
        let mut subscription = self.load_subscription(payment).await?;
        let expected_updated_at = subscription.updated_at;

        let mut payment = payment.clone();
        payment.note_method(event.method);
        payment.fail(event.reason.clone(), event.raw_payload.clone(), now)?;

        // Only a renewal failure lapses the contract; trials wait for the
        // next attempt and never skip to past_due
        let marked_past_due = subscription.status == SubscriptionStatus::Active;
        if marked_past_due {
            subscription.mark_past_due(now)?;
        }

        Ok(Settlement {
            payment,
            subscription: marked_past_due.then_some(subscription),
            expected_updated_at,
            outcome: ReconcileOutcome::Failed { marked_past_due },
        })
    }

    fn already_processed(&self, payment_id: PaymentId, status: PaymentStatus) -> ReconcilePaymentResult {
        tracing::info!(
            payment_id = %payment_id,
            status = %status,
            "payment already processed"
        );
        ReconcilePaymentResult {
            payment_id,
            outcome: ReconcileOutcome::AlreadyProcessed { status },
            events: StepOutcome::skipped("already processed"),
        }
    }
}

fn settlement_events(settlement: &Settlement, correlation_id: Option<&str>) -> Vec<EventEnvelope> {
    let payment = &settlement.payment;
    let mut envelopes = Vec::with_capacity(2);

    match settlement.outcome {
        ReconcileOutcome::Completed { effect } => {
            envelopes.push(
                PaymentConfirmed {
                    event_id: EventId::new(),
                    payment_id: payment.id,
                    subscription_id: payment.subscription_id,
                    amount_cents: payment.amount_cents,
                    currency: payment.currency.clone(),
                    method: payment.method,
                    confirmed_at: payment.confirmed_at.unwrap_or(payment.updated_at),
                }
                .to_envelope(),
            );
            if let (Some(effect), Some(subscription)) = (effect, &settlement.subscription) {
                envelopes.push(
                    SubscriptionEvent::new(SubscriptionChange::from(effect), subscription)
                        .to_envelope(),
                );
            }
        }
        ReconcileOutcome::Failed { .. } => {
            envelopes.push(
                PaymentFailed {
                    event_id: EventId::new(),
                    payment_id: payment.id,
                    subscription_id: payment.subscription_id,
                    reason: payment.failure_reason.clone(),
                    failed_at: payment.updated_at,
                }
                .to_envelope(),
            );
            if let Some(subscription) = &settlement.subscription {
                envelopes.push(
                    SubscriptionEvent::new(SubscriptionChange::PastDue, subscription).to_envelope(),
                );
            }
        }
        ReconcileOutcome::AlreadyProcessed { .. } | ReconcileOutcome::Acknowledged => {}
    }

    match correlation_id {
        Some(id) => envelopes
            .into_iter()
            .map(|envelope| envelope.with_correlation_id(id))
            .collect(),
        None => envelopes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::FailurePoint;
    use crate::application::handlers::test_support::Fixture;
    use crate::domain::payment::{PaymentEventStatus, PaymentMethod, PaymentReferences};
    use serde_json::json;

    fn handler(f: &Fixture) -> ReconcilePaymentHandler {
        ReconcilePaymentHandler::new(f.store.clone(), f.store.clone(), f.bus.clone())
    }

    async fn pending_payment(f: &Fixture, subscription: &Subscription) -> Payment {
        let payment = Payment::create_pending(
            subscription.id,
            PaymentReferences {
                external_payment_id: Some("ext-1".to_string()),
                request_id: Some("req-1".to_string()),
                order_id: Some("ord-1".to_string()),
            },
            subscription.amount_due_cents(),
            "EUR",
            None,
            Timestamp::now(),
        );
        PaymentLedger::create(f.store.as_ref(), &payment).await.unwrap();
        payment
    }

    fn event(status: &str) -> PaymentEvent {
        PaymentEvent {
            external_payment_id: Some("ext-1".to_string()),
            request_id: None,
            order_id: None,
            status: PaymentEventStatus::from_provider(status),
            raw_status: status.to_string(),
            reason: Some("card declined".to_string()),
            method: Some(PaymentMethod::ReferencePair),
            raw_payload: json!({ "status": status }),
        }
    }

    async fn apply(f: &Fixture, event: PaymentEvent) -> Result<ReconcilePaymentResult, BillingError> {
        handler(f)
            .handle(ReconcilePaymentCommand {
                event,
                correlation_id: None,
            })
            .await
    }

    // ════════════════════════════════════════════════════════════════
    // Completion
    // ════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn completed_event_activates_trial() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::Trialing, 1);
        let payment = pending_payment(&f, &sub).await;

        let result = apply(&f, event("paid")).await.unwrap();

        assert_eq!(
            result.outcome,
            ReconcileOutcome::Completed {
                effect: Some(PaymentEffect::Activated)
            }
        );
        let stored = f.store.payment(&payment.id).unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert!(stored.confirmed_at.is_some());
        assert_eq!(stored.method, Some(PaymentMethod::ReferencePair));
        let sub = f.store.subscription(&sub.id).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(f.bus.has_event("payment.confirmed.v1"));
        assert!(f.bus.has_event("subscription.activated.v1"));
    }

    #[tokio::test]
    async fn published_events_carry_the_callback_request_id() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::Trialing, 1);
        pending_payment(&f, &sub).await;

        handler(&f)
            .handle(ReconcilePaymentCommand {
                event: event("paid"),
                correlation_id: Some("req-abc".to_string()),
            })
            .await
            .unwrap();

        let published = f.bus.published_events();
        assert_eq!(published.len(), 2);
        for envelope in published {
            assert_eq!(envelope.metadata.correlation_id.as_deref(), Some("req-abc"));
        }
    }

    #[tokio::test]
    async fn completed_event_recovers_past_due_and_extends_period() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::PastDue, 1);
        pending_payment(&f, &sub).await;

        apply(&f, event("completed")).await.unwrap();

        let updated = f.store.subscription(&sub.id).unwrap();
        assert_eq!(updated.status, SubscriptionStatus::Active);
        assert!(updated.current_period_end.is_after(&sub.current_period_end));
    }

    #[tokio::test]
    async fn duplicate_completed_event_changes_state_once() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::Active, 1);
        pending_payment(&f, &sub).await;

        apply(&f, event("paid")).await.unwrap();
        let after_first = f.store.subscription(&sub.id).unwrap();
        let events_after_first = f.bus.event_count();

        let second = apply(&f, event("paid")).await.unwrap();

        assert_eq!(
            second.outcome,
            ReconcileOutcome::AlreadyProcessed {
                status: PaymentStatus::Completed
            }
        );
        assert_eq!(f.store.subscription(&sub.id).unwrap(), after_first);
        assert_eq!(f.bus.event_count(), events_after_first);
    }

    #[tokio::test]
    async fn failed_after_completed_is_ignored() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::Active, 1);
        let payment = pending_payment(&f, &sub).await;

        apply(&f, event("paid")).await.unwrap();
        let late = apply(&f, event("failed")).await.unwrap();

        assert!(matches!(late.outcome, ReconcileOutcome::AlreadyProcessed { .. }));
        assert_eq!(
            f.store.payment(&payment.id).unwrap().status,
            PaymentStatus::Completed
        );
        assert_eq!(
            f.store.subscription(&sub.id).unwrap().status,
            SubscriptionStatus::Active
        );
    }

    #[tokio::test]
    async fn completed_for_canceled_subscription_confirms_payment_only() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::Canceled, 1);
        let payment = pending_payment(&f, &sub).await;

        let result = apply(&f, event("paid")).await.unwrap();

        assert_eq!(result.outcome, ReconcileOutcome::Completed { effect: None });
        assert_eq!(
            f.store.payment(&payment.id).unwrap().status,
            PaymentStatus::Completed
        );
        assert_eq!(f.store.subscription(&sub.id).unwrap(), sub);
    }

    // ════════════════════════════════════════════════════════════════
    // Failure
    // ════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn failed_event_marks_active_subscription_past_due() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::Active, 1);
        let payment = pending_payment(&f, &sub).await;

        let result = apply(&f, event("rejected")).await.unwrap();

        assert_eq!(
            result.outcome,
            ReconcileOutcome::Failed {
                marked_past_due: true
            }
        );
        let stored = f.store.payment(&payment.id).unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);
        assert_eq!(stored.failure_reason.as_deref(), Some("card declined"));
        assert_eq!(
            f.store.subscription(&sub.id).unwrap().status,
            SubscriptionStatus::PastDue
        );
        assert!(f.bus.has_event("payment.failed.v1"));
        assert!(f.bus.has_event("subscription.past_due.v1"));
    }

    #[tokio::test]
    async fn failed_event_leaves_trial_trialing() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::Trialing, 1);
        pending_payment(&f, &sub).await;

        let result = apply(&f, event("failed")).await.unwrap();

        assert_eq!(
            result.outcome,
            ReconcileOutcome::Failed {
                marked_past_due: false
            }
        );
        assert_eq!(
            f.store.subscription(&sub.id).unwrap().status,
            SubscriptionStatus::Trialing
        );
    }

    // ════════════════════════════════════════════════════════════════
    // Lookup and acknowledgement
    // ════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unknown_status_is_acknowledged_without_change() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::Trialing, 1);
        let payment = pending_payment(&f, &sub).await;

        let result = apply(&f, event("processing")).await.unwrap();

        assert_eq!(result.outcome, ReconcileOutcome::Acknowledged);
        assert_eq!(f.store.payment(&payment.id).unwrap(), payment);
        assert_eq!(f.bus.event_count(), 0);
    }

    #[tokio::test]
    async fn unmatched_event_is_not_found_and_creates_nothing() {
        let f = Fixture::new();
        let mut unknown = event("paid");
        unknown.external_payment_id = Some("nope".to_string());

        let err = apply(&f, unknown).await.unwrap_err();

        assert!(matches!(err, BillingError::NotFound(_)));
    }

    #[tokio::test]
    async fn request_id_wins_then_order_id() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::Trialing, 1);
        let payment = pending_payment(&f, &sub).await;

        let mut by_order = event("paid");
        by_order.external_payment_id = None;
        by_order.request_id = Some("unknown-request".to_string());
        by_order.order_id = Some("ord-1".to_string());

        let result = apply(&f, by_order).await.unwrap();

        assert_eq!(result.payment_id, payment.id);
    }

    #[tokio::test]
    async fn event_without_identifiers_is_validation_error() {
        let f = Fixture::new();
        let mut anonymous = event("paid");
        anonymous.external_payment_id = Some("  ".to_string());

        let err = apply(&f, anonymous).await.unwrap_err();

        assert!(matches!(err, BillingError::Validation(_)));
    }

    // ════════════════════════════════════════════════════════════════
    // Failure isolation
    // ════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn publish_failure_keeps_confirmation() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::Trialing, 1);
        let payment = pending_payment(&f, &sub).await;
        f.bus.set_failing(true);

        let result = apply(&f, event("paid")).await.unwrap();

        assert!(result.events.is_failed());
        assert_eq!(
            f.store.payment(&payment.id).unwrap().status,
            PaymentStatus::Completed
        );
    }

    #[tokio::test]
    async fn settlement_failure_writes_nothing() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::Trialing, 1);
        let payment = pending_payment(&f, &sub).await;
        f.store.fail_on(FailurePoint::PaymentSettle);

        let err = apply(&f, event("paid")).await.unwrap_err();

        assert!(matches!(err, BillingError::Internal(_)));
        assert_eq!(f.store.payment(&payment.id).unwrap(), payment);
        assert_eq!(f.store.subscription(&sub.id).unwrap(), sub);
    }

    #[tokio::test]
    async fn concurrent_duplicates_settle_once() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::Active, 1);
        pending_payment(&f, &sub).await;
        let h = handler(&f);

        let (a, b) = tokio::join!(
            h.handle(ReconcilePaymentCommand {
                event: event("paid"),
                correlation_id: None,
            }),
            h.handle(ReconcilePaymentCommand {
                event: event("paid"),
                correlation_id: None,
            })
        );

        let completed = [a.unwrap().outcome, b.unwrap().outcome]
            .iter()
            .filter(|o| matches!(o, ReconcileOutcome::Completed { .. }))
            .count();
        assert_eq!(completed, 1);
        assert_eq!(f.bus.events_of_type("payment.confirmed.v1").len(), 1);
        let updated = f.store.subscription(&sub.id).unwrap();
        assert_eq!(updated.current_period_end, sub.plan.billing_interval.advance(sub.current_period_end));
    }
}
