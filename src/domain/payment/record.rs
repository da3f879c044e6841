//! Payment record and its write-once status.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentId, StateMachine, SubscriptionId, Timestamp,
};

/// Payment status. `Completed` and `Failed` are terminal and write-once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentStatus::*;
        matches!((self, target), (Pending, Completed) | (Pending, Failed))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentStatus::*;
        match self {
            Pending => vec![Completed, Failed],
            Completed | Failed => vec![],
        }
    }
}

/// How the payer paid, as inferred from the callback shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Entity + reference pair paid at an ATM or home banking.
    ReferencePair,
    /// Push approval on the payer's phone.
    MobilePush,
    /// Direct debit against a signed mandate.
    Mandate,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::ReferencePair => "reference_pair",
            PaymentMethod::MobilePush => "mobile_push",
            PaymentMethod::Mandate => "mandate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reference_pair" => Some(PaymentMethod::ReferencePair),
            "mobile_push" => Some(PaymentMethod::MobilePush),
            "mandate" => Some(PaymentMethod::Mandate),
            _ => None,
        }
    }
}

/// A charge against a subscription.
///
/// Created `pending` when a charge is requested from the PSP, then settled
/// exactly once by a callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub subscription_id: SubscriptionId,
    pub external_payment_id: Option<String>,
    pub request_id: Option<String>,
    pub order_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: Option<PaymentMethod>,
    pub raw_callback_payload: Option<JsonValue>,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
    pub confirmed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

/// Correlation keys handed to the PSP when a charge is requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentReferences {
    pub external_payment_id: Option<String>,
    pub request_id: Option<String>,
    pub order_id: Option<String>,
}

impl PaymentReferences {
    pub fn is_empty(&self) -> bool {
        self.external_payment_id.is_none() && self.request_id.is_none() && self.order_id.is_none()
    }
}

impl Payment {
    pub fn create_pending(
        subscription_id: SubscriptionId,
        references: PaymentReferences,
        amount_cents: i64,
        currency: impl Into<String>,
        method: Option<PaymentMethod>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            subscription_id,
            external_payment_id: references.external_payment_id,
            request_id: references.request_id,
            order_id: references.order_id,
            amount_cents,
            currency: currency.into(),
            status: PaymentStatus::Pending,
            method,
            raw_callback_payload: None,
            failure_reason: None,
            created_at: now,
            confirmed_at: None,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Marks the payment completed and stamps `confirmed_at`.
    pub fn complete(&mut self, raw: JsonValue, now: Timestamp) -> Result<(), DomainError> {
        self.transition_to(PaymentStatus::Completed)?;
        self.confirmed_at = Some(now);
        self.raw_callback_payload = Some(raw);
        self.updated_at = now;
        Ok(())
    }

    pub fn fail(
        &mut self,
        reason: Option<String>,
        raw: JsonValue,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        self.transition_to(PaymentStatus::Failed)?;
        self.failure_reason = reason;
        self.raw_callback_payload = Some(raw);
        self.updated_at = now;
        Ok(())
    }

    /// Records the method reported by a callback when none was known.
    pub fn note_method(&mut self, method: Option<PaymentMethod>) {
        if self.method.is_none() {
            self.method = method;
        }
    }

    fn transition_to(&mut self, target: PaymentStatus) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::new(
                ErrorCode::AlreadyProcessed,
                format!("Payment {} is already {}", self.id, self.status),
            ));
        }
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot transition payment from {} to {}", self.status, target),
            )
        })?;
        Ok(())
    }
}
