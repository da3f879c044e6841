//! Payment settlement events.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{domain_event, EventId, PaymentId, SubscriptionId, Timestamp};

use super::PaymentMethod;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmed {
    pub event_id: EventId,
    pub payment_id: PaymentId,
    pub subscription_id: SubscriptionId,
    pub amount_cents: i64,
    pub currency: String,
    pub method: Option<PaymentMethod>,
    pub confirmed_at: Timestamp,
}

domain_event!(
    PaymentConfirmed,
    event_type = "payment.confirmed.v1",
    aggregate_id = payment_id,
    aggregate_type = "Payment",
    occurred_at = confirmed_at,
    event_id = event_id
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailed {
    pub event_id: EventId,
    pub payment_id: PaymentId,
    pub subscription_id: SubscriptionId,
    pub reason: Option<String>,
    pub failed_at: Timestamp,
}

domain_event!(
    PaymentFailed,
    event_type = "payment.failed.v1",
    aggregate_id = payment_id,
    aggregate_type = "Payment",
    occurred_at = failed_at,
    event_id = event_id
);
