//! License allocation entity.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    AllocationId, CondominiumId, DomainError, ErrorCode, SubscriptionId, Timestamp, UserId,
};

/// One unit of subscription capacity consumed by one condominium.
///
/// # Invariants
///
/// - A condominium has at most one allocation with `released_at == None`
/// - Active allocations per subscription never exceed its `license_count`
///   when created through allocate or transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseAllocation {
    pub id: AllocationId,
    pub subscription_id: SubscriptionId,
    pub condominium_id: CondominiumId,
    pub assigned_by_user_id: Option<UserId>,
    pub is_professional_transfer: bool,
    pub assigned_at: Timestamp,
    pub released_at: Option<Timestamp>,
}

impl LicenseAllocation {
    /// Creates an active allocation.
    pub fn assign(
        subscription_id: SubscriptionId,
        condominium_id: CondominiumId,
        assigned_by_user_id: Option<UserId>,
        is_professional_transfer: bool,
        now: Timestamp,
    ) -> Self {
        Self {
            id: AllocationId::new(),
            subscription_id,
            condominium_id,
            assigned_by_user_id,
            is_professional_transfer,
            assigned_at: now,
            released_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.released_at.is_none()
    }

    pub fn release(&mut self, now: Timestamp) -> Result<(), DomainError> {
        if !self.is_active() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Allocation {} is already released", self.id),
            ));
        }
        self.released_at = Some(now);
        Ok(())
    }
}

/// Atomic license transfer between two subscriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseTransfer {
    pub condominium_id: CondominiumId,
    pub from_subscription_id: SubscriptionId,
    pub to_subscription_id: SubscriptionId,
    pub acting_user_id: UserId,
    pub is_professional_transfer: bool,
}

/// Result of an atomic transfer attempt.
///
/// Every variant except `Transferred` means nothing was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Old allocation released, new one active under the destination.
    Transferred {
        released: AllocationId,
        created: AllocationId,
    },

    /// The source subscription does not hold an active allocation for the
    /// condominium (already moved, or never held it).
    SourceNotHolding,

    /// The destination has no spare capacity.
    CapacityExceeded { active: u32, license_count: u32 },

    /// The destination subscription is missing or canceled.
    DestinationInactive,
}

/// Result of an atomic allocate attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocateOutcome {
    Allocated(LicenseAllocation),

    /// The condominium already consumes an active allocation.
    AlreadyAllocated,

    CapacityExceeded { active: u32, license_count: u32 },
}
