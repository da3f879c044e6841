//! PSP callback endpoints.
//!
//! - `POST /webhooks/payments` - generic JSON webhook, HMAC-signed
//! - `GET /webhooks/payments/callback` - multi-channel dialect, keyed by the
//!   anti-phishing `key` query parameter
//!
//! Both verify authenticity before anything else, then hand the canonical
//! event to the reconciler. Responses are JSON only.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::application::handlers::payment::{ReconcileOutcome, ReconcilePaymentCommand};
use crate::domain::billing::BillingError;
use crate::domain::payment::gateway::SIGNATURE_HEADER;
use crate::domain::payment::{Params, PaymentEvent, WebhookError};

use super::dto::{WebhookAck, WebhookErrorBody};

const REQUEST_ID_HEADER: &str = "x-request-id";
use super::state::BillingAppState;

/// POST /webhooks/payments
pub async fn generic_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.gateway.generic(&body, signature) {
        Ok(event) => reconcile(&state, event, request_id(&headers)).await,
        Err(err) => rejected("generic", err),
    }
}

/// GET /webhooks/payments/callback
pub async fn dialect_callback(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    Query(params): Query<Params>,
) -> Response {
    match state.gateway.dialect(&params) {
        Ok(event) => reconcile(&state, event, request_id(&headers)).await,
        Err(err) => rejected("dialect", err),
    }
}

/// Request id assigned by the middleware stack, if any.
fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn reconcile(
    state: &BillingAppState,
    event: PaymentEvent,
    correlation_id: Option<String>,
) -> Response {
    let handler = state.reconcile_payment_handler();
    let command = ReconcilePaymentCommand {
        event,
        correlation_id,
    };
    match handler.handle(command).await {
        Ok(result) => match result.outcome {
            ReconcileOutcome::AlreadyProcessed { .. } => {
                (StatusCode::OK, Json(WebhookAck::already_processed())).into_response()
            }
            _ => (StatusCode::OK, Json(WebhookAck::ok())).into_response(),
        },
        Err(err) => failed(err),
    }
}

fn rejected(shape: &'static str, err: WebhookError) -> Response {
    tracing::warn!(shape, error = %err, "payment callback rejected");
    let status = err.status_code();
    (status, Json(WebhookErrorBody { error: err.to_string() })).into_response()
}

fn failed(err: BillingError) -> Response {
    let status = err.status_code();
    let error = match &err {
        BillingError::Internal(_) => {
            tracing::error!(error = %err, "payment reconciliation failed");
            "Internal error".to_string()
        }
        _ => {
            tracing::warn!(code = err.code(), error = %err, "payment callback not applied");
            err.to_string()
        }
    };
    (status, Json(WebhookErrorBody { error })).into_response()
}
