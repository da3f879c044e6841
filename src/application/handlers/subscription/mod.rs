//! Subscription handlers.
//!
//! ## Commands
//! - Starting a trial (or a direct signup with a zero-day trial)
//! - Changing or upgrading the plan
//! - Cancelling and reactivating
//!
//! ## Queries
//! - Get the caller's live subscription

/// Load-modify-write rounds before a contended update is reported as a
/// conflict.
const MAX_UPDATE_ATTEMPTS: usize = 3;

mod cancel_subscription;
mod change_plan;
mod get_subscription;
mod reactivate_subscription;
mod start_trial;

// Commands
pub use cancel_subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
};
pub use change_plan::{ChangePlanCommand, ChangePlanHandler, ChangePlanResult, PlanChangeMode};
pub use reactivate_subscription::{
    ReactivateSubscriptionCommand, ReactivateSubscriptionHandler, ReactivateSubscriptionResult,
};
pub use start_trial::{StartTrialCommand, StartTrialHandler, StartTrialResult, MAX_TRIAL_DAYS};

// Queries
pub use get_subscription::{GetSubscriptionHandler, GetSubscriptionQuery, GetSubscriptionResult};
