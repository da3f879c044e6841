//! Payment domain module.
//!
//! # Module Structure
//!
//! - `record` - Payment record with write-once terminal status
//! - `event` - Canonical PaymentEvent and the reconciliation decision
//! - `gateway` - Callback verification and normalization
//! - `events` - Settlement domain events
//! - `webhook_errors` - Callback validation errors

mod event;
mod events;
pub mod gateway;
mod record;
mod webhook_errors;

pub use event::{PaymentEvent, PaymentEventStatus, PaymentLookup, Reconciliation};
pub use events::{PaymentConfirmed, PaymentFailed};
pub use gateway::{DialectCallback, MethodFields, Params, PaymentGateway, SharedSecretVerifier};
pub use record::{Payment, PaymentMethod, PaymentReferences, PaymentStatus};
pub use webhook_errors::WebhookError;
