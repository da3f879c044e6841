//! HTTP adapter - axum routes over the application handlers.
//!
//! - `subscriptions` / `licenses` - account endpoints, JSON in and out
//! - `transfers` - admin transfer decisions (form posts with flash redirects)
//! - `webhooks` - PSP callbacks

pub mod context;
pub mod dto;
pub mod error;
pub mod licenses;
pub mod routes;
pub mod state;
pub mod subscriptions;
pub mod transfers;
pub mod webhooks;

pub use error::ApiError;
pub use routes::{app, billing_router};
pub use state::{BillingAppState, HttpSettings};
