//! Axum router configuration for the billing endpoints.

use std::time::Duration;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value as JsonValue};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::licenses::capacity;
use super::state::BillingAppState;
use super::subscriptions::{
    cancel, change_plan, current_subscription, reactivate, start_trial, upgrade,
};
use super::transfers::{accept_transfer, list_pending, reject_transfer};
use super::webhooks::{dialect_callback, generic_webhook};

/// Subscription and license routes for the signed-in account.
///
/// # Routes
/// - `GET /subscriptions/current` - Current subscription and license usage
/// - `POST /subscriptions/trial` - Start a trial (or a direct signup)
/// - `POST /subscriptions/change-plan` - Switch plan
/// - `POST /subscriptions/upgrade` - Switch to a more expensive plan
/// - `POST /subscriptions/:id/cancel`
/// - `POST /subscriptions/:id/reactivate`
/// - `GET /licenses/capacity` - Whether another condominium fits
pub fn account_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/subscriptions/current", get(current_subscription))
        .route("/subscriptions/trial", post(start_trial))
        .route("/subscriptions/change-plan", post(change_plan))
        .route("/subscriptions/upgrade", post(upgrade))
        .route("/subscriptions/:id/cancel", post(cancel))
        .route("/subscriptions/:id/reactivate", post(reactivate))
        .route("/licenses/capacity", get(capacity))
}

/// Admin transfer decisions.
///
/// # Routes
/// - `GET /admin/transfers/pending` - Pending offers addressed to the caller
/// - `POST /admin/transfers/accept` - Form post, answers with a redirect
/// - `POST /admin/transfers/reject` - Form post, answers with a redirect
pub fn transfer_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/admin/transfers/pending", get(list_pending))
        .route("/admin/transfers/accept", post(accept_transfer))
        .route("/admin/transfers/reject", post(reject_transfer))
}

/// PSP callbacks. No user authentication; each shape carries its own
/// shared-secret proof.
///
/// # Routes
/// - `POST /webhooks/payments` - Generic signed JSON webhook
/// - `GET /webhooks/payments/callback` - Multi-channel dialect callback
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/webhooks/payments", post(generic_webhook))
        .route("/webhooks/payments/callback", get(dialect_callback))
}

/// All billing routes, without state or middleware.
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        .merge(account_routes())
        .merge(transfer_routes())
        .merge(webhook_routes())
}

async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "ok" }))
}

/// The full application: billing routes behind request-id, tracing and
/// timeout layers, plus an unlayered `/health`.
pub fn app(state: BillingAppState, request_timeout: Duration) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .merge(billing_router())
        .layer(middleware)
        .route("/health", get(health))
        .with_state(state)
}
