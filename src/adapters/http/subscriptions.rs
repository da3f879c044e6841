//! Subscription endpoints for the signed-in account.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::application::handlers::subscription::{
    CancelSubscriptionCommand, ChangePlanCommand, GetSubscriptionQuery, PlanChangeMode,
    ReactivateSubscriptionCommand, StartTrialCommand,
};
use crate::domain::billing::BillingError;
use crate::domain::foundation::{PlanId, SubscriptionId};

use super::context::RequestContext;
use super::dto::{
    ChangePlanRequest, ChangePlanResponse, CurrentSubscriptionResponse, StartTrialRequest,
    SubscriptionResponse,
};
use super::error::ApiError;
use super::state::BillingAppState;

fn plan_id(raw: i64) -> Result<PlanId, ApiError> {
    PlanId::new(raw).map_err(|e| ApiError(BillingError::validation(e.to_string())))
}

fn subscription_id(raw: &str) -> Result<SubscriptionId, ApiError> {
    raw.parse::<SubscriptionId>()
        .map_err(|_| ApiError(BillingError::validation("Invalid subscription id")))
}

/// GET /subscriptions/current
pub async fn current_subscription(
    State(state): State<BillingAppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .get_subscription_handler()
        .handle(GetSubscriptionQuery {
            user_id: ctx.user_id,
        })
        .await?;

    Ok(Json(CurrentSubscriptionResponse {
        subscription: result.subscription.as_ref().map(SubscriptionResponse::from),
        active_licenses: result.active_licenses,
    }))
}

/// POST /subscriptions/trial
pub async fn start_trial(
    State(state): State<BillingAppState>,
    ctx: RequestContext,
    Json(request): Json<StartTrialRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .start_trial_handler()
        .handle(StartTrialCommand {
            user_id: ctx.user_id,
            plan_id: plan_id(request.plan_id)?,
            trial_days: request
                .trial_days
                .unwrap_or(state.settings.default_trial_days),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubscriptionResponse::from(&result.subscription)),
    ))
}

async fn change_plan_with(
    state: BillingAppState,
    ctx: RequestContext,
    request: ChangePlanRequest,
    mode: PlanChangeMode,
) -> Result<Json<ChangePlanResponse>, ApiError> {
    let result = state
        .change_plan_handler()
        .handle(ChangePlanCommand {
            user_id: ctx.user_id,
            plan_id: plan_id(request.plan_id)?,
            mode,
        })
        .await?;

    Ok(Json(ChangePlanResponse::from(&result)))
}

/// POST /subscriptions/change-plan
pub async fn change_plan(
    State(state): State<BillingAppState>,
    ctx: RequestContext,
    Json(request): Json<ChangePlanRequest>,
) -> Result<Json<ChangePlanResponse>, ApiError> {
    change_plan_with(state, ctx, request, PlanChangeMode::Change).await
}

/// POST /subscriptions/upgrade
pub async fn upgrade(
    State(state): State<BillingAppState>,
    ctx: RequestContext,
    Json(request): Json<ChangePlanRequest>,
) -> Result<Json<ChangePlanResponse>, ApiError> {
    change_plan_with(state, ctx, request, PlanChangeMode::Upgrade).await
}

/// POST /subscriptions/:id/cancel
pub async fn cancel(
    State(state): State<BillingAppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .cancel_subscription_handler()
        .handle(CancelSubscriptionCommand {
            subscription_id: subscription_id(&id)?,
            requested_by: ctx.user_id,
        })
        .await?;

    Ok(Json(SubscriptionResponse::from(&result.subscription)))
}

/// POST /subscriptions/:id/reactivate
pub async fn reactivate(
    State(state): State<BillingAppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .reactivate_subscription_handler()
        .handle(ReactivateSubscriptionCommand {
            subscription_id: subscription_id(&id)?,
            requested_by: ctx.user_id,
        })
        .await?;

    Ok(Json(SubscriptionResponse::from(&result.subscription)))
}
