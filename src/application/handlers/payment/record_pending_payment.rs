//! RecordPendingPaymentHandler - Creates the pending payment for a charge
//! requested from the PSP.
//!
//! This is the only way a payment record comes into existence; callbacks
//! never create one.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::payment::{Payment, PaymentMethod, PaymentReferences};
use crate::ports::{PaymentLedger, SubscriptionRepository};

#[derive(Debug, Clone)]
pub struct RecordPendingPaymentCommand {
    pub subscription_id: SubscriptionId,
    pub references: PaymentReferences,
    pub method: Option<PaymentMethod>,
}

pub struct RecordPendingPaymentHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    ledger: Arc<dyn PaymentLedger>,
}

impl RecordPendingPaymentHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        ledger: Arc<dyn PaymentLedger>,
    ) -> Self {
        Self {
            subscriptions,
            ledger,
        }
    }

    pub async fn handle(&self, cmd: RecordPendingPaymentCommand) -> Result<Payment, BillingError> {
        // 1. A callback must be able to find the payment again
        let references = normalize(cmd.references);
        if references.is_empty() {
            return Err(BillingError::validation(
                "At least one payment reference is required",
            ));
        }

        // 2. Load the subscription being charged
        let subscription = self
            .subscriptions
            .find_by_id(&cmd.subscription_id)
            .await?
            .ok_or_else(|| {
                BillingError::not_found(format!("Subscription {} not found", cmd.subscription_id))
            })?;
        if !subscription.is_live() {
            return Err(BillingError::invalid_state(
                "Cannot charge a canceled subscription",
            ));
        }

        // 3. Amount comes from the contract-time terms
        let payment = Payment::create_pending(
            subscription.id,
            references,
            subscription.amount_due_cents(),
            subscription.plan.currency.clone(),
            cmd.method,
            Timestamp::now(),
        );
        self.ledger.create(&payment).await?;

        tracing::info!(
            payment_id = %payment.id,
            subscription_id = %subscription.id,
            amount_cents = payment.amount_cents,
            currency = %payment.currency,
            "pending payment recorded"
        );
        Ok(payment)
    }
}

fn normalize(references: PaymentReferences) -> PaymentReferences {
    let clean = |v: Option<String>| {
        v.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    PaymentReferences {
        external_payment_id: clean(references.external_payment_id),
        request_id: clean(references.request_id),
        order_id: clean(references.order_id),
    }
}
