//! License capacity query consumed by condominium creation.

use axum::extract::State;
use axum::Json;

use crate::application::handlers::licensing::CanCreateCondominiumQuery;

use super::context::RequestContext;
use super::dto::CapacityResponse;
use super::error::ApiError;
use super::state::BillingAppState;

/// GET /licenses/capacity
pub async fn capacity(
    State(state): State<BillingAppState>,
    ctx: RequestContext,
) -> Result<Json<CapacityResponse>, ApiError> {
    let result = state
        .can_create_condominium_handler()
        .handle(CanCreateCondominiumQuery {
            user_id: ctx.user_id,
        })
        .await?;

    Ok(Json(CapacityResponse::from(result)))
}
