//! Admin transfer endpoints.
//!
//! Accept and reject are interactive form posts: every outcome, including a
//! failure, is a `303 See Other` back to the pending view with a `flash`
//! cookie. CSRF failures get a generic message; domain failures show their
//! own message; internal failures never leak.

use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;

use crate::application::handlers::transfer::{
    AcceptAdminTransferCommand, AcceptAdminTransferResult, ListPendingTransfersQuery,
    RejectAdminTransferCommand,
};
use crate::domain::billing::BillingError;
use crate::domain::foundation::TransferId;

use super::context::RequestContext;
use super::dto::{PendingTransferResponse, PendingTransfersResponse, TransferDecisionForm};
use super::error::ApiError;
use super::state::BillingAppState;

pub const FLASH_COOKIE: &str = "flash";

const CSRF_FAILURE: &str = "Your session has expired. Please reload the page and try again.";
const INTERNAL_FAILURE: &str = "Something went wrong. Please try again later.";

/// Severity shown with a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }
}

/// `Set-Cookie` value carrying `kind|message`, URL-encoded.
pub fn flash_cookie(kind: FlashKind, message: &str) -> String {
    let encoded: String =
        url::form_urlencoded::byte_serialize(format!("{}|{}", kind.as_str(), message).as_bytes())
            .collect();
    format!(
        "{}={}; Path=/; Max-Age=60; HttpOnly; SameSite=Lax",
        FLASH_COOKIE, encoded
    )
}

fn redirect_with_flash(state: &BillingAppState, kind: FlashKind, message: &str) -> Response {
    let mut response = StatusCode::SEE_OTHER.into_response();
    let headers = response.headers_mut();
    match HeaderValue::from_str(&state.settings.pending_view_path) {
        Ok(location) => {
            headers.insert(header::LOCATION, location);
        }
        Err(_) => {
            headers.insert(header::LOCATION, HeaderValue::from_static("/"));
        }
    }
    if let Ok(cookie) = HeaderValue::from_str(&flash_cookie(kind, message)) {
        headers.insert(header::SET_COOKIE, cookie);
    }
    response
}

/// Double-submit check: the form token must equal the cookie token.
fn verify_csrf(ctx: &RequestContext, form: &TransferDecisionForm) -> Result<(), BillingError> {
    let submitted = form.csrf_token.as_deref().unwrap_or_default();
    let expected = ctx.csrf_cookie.as_deref().unwrap_or_default();
    let matches = !expected.is_empty()
        && submitted.len() == expected.len()
        && bool::from(submitted.as_bytes().ct_eq(expected.as_bytes()));
    if matches {
        Ok(())
    } else {
        Err(BillingError::forbidden("CSRF token mismatch"))
    }
}

/// Unwraps the posted form; a body that is not a decision form is refused
/// like any other failed decision.
fn decision_form(
    form: Result<Form<TransferDecisionForm>, FormRejection>,
) -> Result<TransferDecisionForm, BillingError> {
    form.map(|Form(form)| form).map_err(|rejection| {
        tracing::debug!(error = %rejection, "admin transfer form rejected");
        BillingError::validation("Invalid form submission")
    })
}

fn parse_transfer_id(form: &TransferDecisionForm) -> Result<TransferId, BillingError> {
    let raw = form
        .transfer_id
        .as_deref()
        .ok_or_else(|| BillingError::validation("Missing transfer id"))?;
    raw.parse::<TransferId>()
        .map_err(|_| BillingError::validation("Invalid transfer id"))
}

/// Message shown to the user for a failed decision.
fn failure_message(err: &BillingError) -> String {
    match err {
        BillingError::Forbidden(reason) if reason.contains("CSRF") => CSRF_FAILURE.to_string(),
        BillingError::Internal(_) => INTERNAL_FAILURE.to_string(),
        _ if err.is_user_facing() => err.to_string(),
        _ => "You are not allowed to perform this action.".to_string(),
    }
}

fn decision_failed(state: &BillingAppState, action: &'static str, err: BillingError) -> Response {
    match &err {
        BillingError::Internal(_) => {
            tracing::error!(action, error = %err, "admin transfer decision failed")
        }
        _ => tracing::warn!(action, code = err.code(), error = %err, "admin transfer decision refused"),
    }
    redirect_with_flash(state, FlashKind::Error, &failure_message(&err))
}

fn accepted_message(result: &AcceptAdminTransferResult) -> &'static str {
    if result.license_transfer.is_failed() {
        "Admin transfer accepted. License bookkeeping will be completed by support."
    } else {
        "Admin transfer accepted."
    }
}

/// POST /admin/transfers/accept
pub async fn accept_transfer(
    State(state): State<BillingAppState>,
    ctx: RequestContext,
    form: Result<Form<TransferDecisionForm>, FormRejection>,
) -> Response {
    let outcome = async {
        let form = decision_form(form)?;
        verify_csrf(&ctx, &form)?;
        let transfer_id = parse_transfer_id(&form)?;
        state
            .accept_transfer_handler()
            .handle(AcceptAdminTransferCommand {
                transfer_id,
                acting_user_id: ctx.user_id,
            })
            .await
    }
    .await;

    match outcome {
        Ok(result) => redirect_with_flash(&state, FlashKind::Success, accepted_message(&result)),
        Err(err) => decision_failed(&state, "accept", err),
    }
}

/// POST /admin/transfers/reject
pub async fn reject_transfer(
    State(state): State<BillingAppState>,
    ctx: RequestContext,
    form: Result<Form<TransferDecisionForm>, FormRejection>,
) -> Response {
    let outcome = async {
        let form = decision_form(form)?;
        verify_csrf(&ctx, &form)?;
        let transfer_id = parse_transfer_id(&form)?;
        state
            .reject_transfer_handler()
            .handle(RejectAdminTransferCommand {
                transfer_id,
                acting_user_id: ctx.user_id,
            })
            .await
    }
    .await;

    match outcome {
        Ok(_) => redirect_with_flash(&state, FlashKind::Success, "Admin transfer rejected."),
        Err(err) => decision_failed(&state, "reject", err),
    }
}

/// GET /admin/transfers/pending
pub async fn list_pending(
    State(state): State<BillingAppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let transfers = state
        .list_pending_transfers_handler()
        .handle(ListPendingTransfersQuery {
            user_id: ctx.user_id,
        })
        .await?;

    Ok(Json(PendingTransfersResponse {
        transfers: transfers.iter().map(PendingTransferResponse::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    fn ctx(cookie: Option<&str>) -> RequestContext {
        RequestContext {
            user_id: UserId::new(1).unwrap(),
            csrf_cookie: cookie.map(str::to_string),
        }
    }

    fn form(transfer_id: Option<&str>, token: Option<&str>) -> TransferDecisionForm {
        TransferDecisionForm {
            transfer_id: transfer_id.map(str::to_string),
            csrf_token: token.map(str::to_string),
        }
    }

    #[test]
    fn csrf_requires_matching_non_empty_tokens() {
        assert!(verify_csrf(&ctx(Some("abc")), &form(None, Some("abc"))).is_ok());
        assert!(verify_csrf(&ctx(Some("abc")), &form(None, Some("abd"))).is_err());
        assert!(verify_csrf(&ctx(None), &form(None, Some("abc"))).is_err());
        assert!(verify_csrf(&ctx(Some("")), &form(None, Some(""))).is_err());
    }

    #[test]
    fn transfer_id_must_be_a_positive_integer() {
        assert_eq!(parse_transfer_id(&form(Some("12"), None)).unwrap().as_i64(), 12);
        assert!(parse_transfer_id(&form(Some("abc"), None)).is_err());
        assert!(parse_transfer_id(&form(Some("-3"), None)).is_err());
        assert!(parse_transfer_id(&form(None, None)).is_err());
    }

    #[test]
    fn csrf_failures_use_generic_message() {
        let message = failure_message(&BillingError::forbidden("CSRF token mismatch"));
        assert_eq!(message, CSRF_FAILURE);
    }

    #[test]
    fn domain_failures_show_their_message() {
        let message = failure_message(&BillingError::already_processed(
            "This transfer has already been processed",
        ));
        assert_eq!(message, "This transfer has already been processed");
    }

    #[test]
    fn internal_failures_never_leak() {
        let message = failure_message(&BillingError::internal("connection refused"));
        assert_eq!(message, INTERNAL_FAILURE);
    }

    #[test]
    fn flash_cookie_is_url_encoded() {
        let cookie = flash_cookie(FlashKind::Error, "Capacity exceeded: 2/2");
        assert!(cookie.starts_with("flash=error%7CCapacity+exceeded%3A+2%2F2;"));
        assert!(cookie.contains("HttpOnly"));
    }
}
