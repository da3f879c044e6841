//! Payment handlers.
//!
//! - Recording the pending payment for a requested charge
//! - Reconciling canonical payment events from PSP callbacks

mod reconcile_payment;
mod record_pending_payment;

pub use reconcile_payment::{
    ReconcileOutcome, ReconcilePaymentCommand, ReconcilePaymentHandler, ReconcilePaymentResult,
};
pub use record_pending_payment::{RecordPendingPaymentCommand, RecordPendingPaymentHandler};
