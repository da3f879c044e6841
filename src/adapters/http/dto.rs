//! Request and response bodies for the billing routes.

use serde::{Deserialize, Serialize};

use crate::application::handlers::licensing::CanCreateCondominiumResult;
use crate::application::handlers::subscription::ChangePlanResult;
use crate::domain::billing::{BillingInterval, Subscription, SubscriptionStatus};
use crate::domain::foundation::Timestamp;
use crate::domain::transfer::AdminTransferPending;

// ════════════════════════════════════════════════════════════════════════════════
// Subscriptions
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct StartTrialRequest {
    pub plan_id: i64,

    /// Defaults to the configured trial length; `0` is a direct signup.
    #[serde(default)]
    pub trial_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePlanRequest {
    pub plan_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionResponse {
    pub id: String,
    pub user_id: i64,
    pub plan_id: i64,
    pub plan_slug: String,
    pub price_cents: i64,
    pub currency: String,
    pub billing_interval: BillingInterval,
    pub status: SubscriptionStatus,
    pub current_period_start: Timestamp,
    pub current_period_end: Timestamp,
    pub trial_ends_at: Option<Timestamp>,
    pub canceled_at: Option<Timestamp>,
    pub license_count: u32,
    pub amount_due_cents: i64,
}

impl From<&Subscription> for SubscriptionResponse {
    fn from(s: &Subscription) -> Self {
        Self {
            id: s.id.to_string(),
            user_id: s.user_id.as_i64(),
            plan_id: s.plan.plan_id.as_i64(),
            plan_slug: s.plan.slug.clone(),
            price_cents: s.plan.price_cents,
            currency: s.plan.currency.clone(),
            billing_interval: s.plan.billing_interval,
            status: s.status,
            current_period_start: s.current_period_start,
            current_period_end: s.current_period_end,
            trial_ends_at: s.trial_ends_at,
            canceled_at: s.canceled_at,
            license_count: s.license_count,
            amount_due_cents: s.amount_due_cents(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentSubscriptionResponse {
    pub subscription: Option<SubscriptionResponse>,
    pub active_licenses: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangePlanResponse {
    pub subscription: SubscriptionResponse,
    pub previous_plan_id: i64,

    /// Allocations above the new capacity; they stay valid.
    pub excess_allocations: u32,
}

impl From<&ChangePlanResult> for ChangePlanResponse {
    fn from(result: &ChangePlanResult) -> Self {
        Self {
            subscription: SubscriptionResponse::from(&result.subscription),
            previous_plan_id: result.previous_plan_id.as_i64(),
            excess_allocations: result.excess_allocations,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Licenses
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct CapacityResponse {
    pub can_create_condominium: bool,
    pub active_licenses: u32,
    pub license_count: u32,
}

impl From<CanCreateCondominiumResult> for CapacityResponse {
    fn from(result: CanCreateCondominiumResult) -> Self {
        Self {
            can_create_condominium: result.allowed,
            active_licenses: result.active,
            license_count: result.license_count,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Admin transfers
// ════════════════════════════════════════════════════════════════════════════════

/// Accept/reject form. Fields stay strings so that bad input becomes a
/// flash message instead of an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferDecisionForm {
    #[serde(default)]
    pub transfer_id: Option<String>,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingTransferResponse {
    pub id: i64,
    pub condominium_id: i64,
    pub assigned_by_user_id: i64,
    pub is_professional_transfer: bool,
    pub created_at: Timestamp,
}

impl From<&AdminTransferPending> for PendingTransferResponse {
    fn from(t: &AdminTransferPending) -> Self {
        Self {
            id: t.id.as_i64(),
            condominium_id: t.condominium_id.as_i64(),
            assigned_by_user_id: t.assigned_by_user_id.as_i64(),
            is_professional_transfer: t.is_professional_transfer,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingTransfersResponse {
    pub transfers: Vec<PendingTransferResponse>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhooks
// ════════════════════════════════════════════════════════════════════════════════

/// Body returned to the provider on acceptance.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl WebhookAck {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn already_processed() -> Self {
        Self {
            success: true,
            message: Some("Already processed"),
        }
    }
}

/// Body returned to the provider on rejection.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookErrorBody {
    pub error: String,
}
