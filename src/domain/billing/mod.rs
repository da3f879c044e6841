//! Billing domain module.
//!
//! # Module Structure
//!
//! - `plan` - Plan catalog entries and contract-time snapshots
//! - `status` - SubscriptionStatus state machine
//! - `subscription` - Subscription aggregate
//! - `events` - Subscription lifecycle events
//! - `errors` - Error taxonomy shared by all handlers

mod errors;
mod events;
pub(crate) mod plan;
mod status;
mod subscription;

pub use errors::BillingError;
pub use events::{SubscriptionChange, SubscriptionEvent};
pub use plan::{BillingInterval, LicensePricingTier, Plan, PlanSnapshot};
pub use status::SubscriptionStatus;
pub use subscription::{PaymentEffect, Subscription};
