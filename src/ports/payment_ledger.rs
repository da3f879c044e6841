//! Payment ledger port.
//!
//! Payments are created `pending` by this engine and settled exactly once.
//! Settlement is a single unit of work: the payment row moves from
//! `pending` with a compare-and-swap, and the owning subscription is
//! written in the same transaction.

use async_trait::async_trait;

use crate::domain::billing::Subscription;
use crate::domain::foundation::{DomainError, PaymentId, Timestamp};
use crate::domain::payment::{Payment, PaymentLookup, PaymentStatus};

/// Subscription write attached to a settlement.
///
/// `expected_updated_at` is the `updated_at` read before the change; the
/// write only applies if the row still carries it.
#[derive(Debug, Clone)]
pub struct SubscriptionWrite<'a> {
    pub subscription: &'a Subscription,
    pub expected_updated_at: Timestamp,
}

/// Result of a settlement attempt. Nothing is written unless `Applied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Applied,

    /// Another delivery settled the payment first.
    AlreadySettled(PaymentStatus),

    /// The subscription changed since it was read.
    SubscriptionChanged,
}

#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Record a new pending payment.
    async fn create(&self, payment: &Payment) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError>;

    /// Find a payment by one correlation key.
    async fn find_by(&self, key: &PaymentLookup<'_>) -> Result<Option<Payment>, DomainError>;

    /// Atomically settle `payment` (already moved to its terminal status in
    /// memory) and optionally write its subscription.
    async fn settle(
        &self,
        payment: &Payment,
        subscription: Option<SubscriptionWrite<'_>>,
    ) -> Result<SettleOutcome, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_ledger_is_object_safe() {
        fn _accepts_dyn(_ledger: &dyn PaymentLedger) {}
    }
}
