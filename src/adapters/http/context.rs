//! Explicit per-request caller context.
//!
//! Session authentication happens upstream; by the time a request reaches
//! these routes the caller is identified by the `X-User-Id` header. The CSRF
//! cookie travels alongside it so form handlers never reach for ambient
//! request state.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::domain::foundation::UserId;

use super::error::ErrorResponse;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const CSRF_COOKIE: &str = "csrf_token";

/// Caller identity plus the request-scoped values the handlers need.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: UserId,

    /// Value of the `csrf_token` cookie, if sent.
    pub csrf_cookie: Option<String>,
}

/// Rejection when no caller identity is present.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let user_id = parts
                .headers
                .get(USER_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<UserId>().ok())
                .ok_or(AuthenticationRequired)?;

            Ok(RequestContext {
                user_id,
                csrf_cookie: cookie(&parts.headers, CSRF_COOKIE),
            })
        })
    }
}

/// Reads one cookie value from the `Cookie` headers.
pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    #[test]
    fn cookie_finds_value_among_several() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; csrf_token=abc123; lang=pt"),
        );
        assert_eq!(cookie(&headers, CSRF_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(cookie(&headers, "missing"), None);
    }

    #[tokio::test]
    async fn extracts_user_and_csrf_cookie() {
        let request = Request::builder()
            .header(USER_ID_HEADER, "42")
            .header(header::COOKIE, "csrf_token=tok")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let ctx = RequestContext::from_request_parts(&mut parts, &()).await.ok().unwrap();

        assert_eq!(ctx.user_id.as_i64(), 42);
        assert_eq!(ctx.csrf_cookie.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn rejects_missing_or_invalid_user() {
        for value in [None, Some("zero"), Some("0")] {
            let mut builder = Request::builder();
            if let Some(v) = value {
                builder = builder.header(USER_ID_HEADER, v);
            }
            let (mut parts, _) = builder.body(()).unwrap().into_parts();
            assert!(RequestContext::from_request_parts(&mut parts, &()).await.is_err());
        }
    }
}
