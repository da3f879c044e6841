//! Canonical, provider-agnostic payment notification.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{PaymentMethod, PaymentStatus};

/// Normalized outcome reported by a PSP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentEventStatus {
    Completed,
    Failed,
    Pending,
}

impl PaymentEventStatus {
    /// Maps a provider status word.
    ///
    /// Anything outside the known vocabulary is `Pending`, so new provider
    /// statuses are acknowledged instead of rejected.
    pub fn from_provider(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "completed" | "paid" => PaymentEventStatus::Completed,
            "failed" | "rejected" => PaymentEventStatus::Failed,
            _ => PaymentEventStatus::Pending,
        }
    }
}

/// A callback after validation and normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub external_payment_id: Option<String>,
    pub request_id: Option<String>,
    pub order_id: Option<String>,
    pub status: PaymentEventStatus,

    /// Status word exactly as the provider sent it.
    pub raw_status: String,

    pub reason: Option<String>,
    pub method: Option<PaymentMethod>,
    pub raw_payload: JsonValue,
}

/// Keys used to find the payment a callback refers to, in lookup order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentLookup<'a> {
    RequestId(&'a str),
    OrderId(&'a str),
    ExternalPaymentId(&'a str),
}

impl PaymentEvent {
    /// Lookup keys in precedence order: request id, then order id, then
    /// external payment id. Blank values are skipped.
    pub fn lookup_keys(&self) -> Vec<PaymentLookup<'_>> {
        fn non_blank(v: &Option<String>) -> Option<&str> {
            v.as_deref().map(str::trim).filter(|s| !s.is_empty())
        }

        let mut keys = Vec::with_capacity(3);
        if let Some(v) = non_blank(&self.request_id) {
            keys.push(PaymentLookup::RequestId(v));
        }
        if let Some(v) = non_blank(&self.order_id) {
            keys.push(PaymentLookup::OrderId(v));
        }
        if let Some(v) = non_blank(&self.external_payment_id) {
            keys.push(PaymentLookup::ExternalPaymentId(v));
        }
        keys
    }
}

/// What the reconciler should do with an event for a given payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The payment is already terminal; nothing changes.
    AlreadyProcessed,
    Complete,
    Fail,
    /// Pending or unknown status; acknowledge without changes.
    Acknowledge,
}

impl Reconciliation {
    pub fn decide(current: PaymentStatus, incoming: PaymentEventStatus) -> Self {
        if current != PaymentStatus::Pending {
            return Reconciliation::AlreadyProcessed;
        }
        match incoming {
            PaymentEventStatus::Completed => Reconciliation::Complete,
            PaymentEventStatus::Failed => Reconciliation::Fail,
            PaymentEventStatus::Pending => Reconciliation::Acknowledge,
        }
    }
}
