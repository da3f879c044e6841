//! In-memory implementation of every persistence and collaborator port.
//!
//! All state sits behind one mutex, so every port call is a serialized unit
//! of work. That gives the same guarantees the PostgreSQL adapters get from
//! transactions and row locks: the settlement compare-and-swap, the
//! capacity check in allocate/transfer and the acceptance unit of work
//! can never interleave.
//!
//! Failure points can be switched on to exercise error paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::billing::{Plan, Subscription};
use crate::domain::foundation::{
    CondominiumId, DomainError, ErrorCode, PaymentId, PlanId, SubscriptionId, Timestamp,
    TransferId, UserId,
};
use crate::domain::licensing::{
    AllocateOutcome, LicenseAllocation, LicenseTransfer, TransferOutcome,
};
use crate::domain::payment::{Payment, PaymentLookup, PaymentStatus};
use crate::domain::transfer::{AdminTransferPending, NewAdminTransfer, TransferStatus};
use crate::ports::{
    AdminRoleDirectory, AdminTransferRepository, LicenseRepository, PaymentLedger, PlanCatalog,
    SettleOutcome, SubscriptionRepository, SubscriptionWrite,
};

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    SubscriptionWrite,
    PaymentSettle,
    LicenseTransfer,
    TransferAcceptance,
    RoleRevoke,
}

#[derive(Default)]
struct State {
    plans: HashMap<PlanId, Plan>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    payments: Vec<Payment>,
    allocations: Vec<LicenseAllocation>,
    transfers: BTreeMap<TransferId, AdminTransferPending>,
    last_transfer_id: i64,
    owners: HashMap<CondominiumId, UserId>,
    admins: HashSet<(UserId, CondominiumId)>,
    failures: HashSet<FailurePoint>,
}

impl State {
    fn check(&self, point: FailurePoint) -> Result<(), DomainError> {
        if self.failures.contains(&point) {
            return Err(DomainError::database(format!("Simulated failure at {:?}", point)));
        }
        Ok(())
    }

    fn active_count(&self, subscription_id: &SubscriptionId) -> u32 {
        let count = self
            .allocations
            .iter()
            .filter(|a| a.is_active() && &a.subscription_id == subscription_id)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn active_for(&mut self, condominium_id: &CondominiumId) -> Option<&mut LicenseAllocation> {
        self.allocations
            .iter_mut()
            .find(|a| a.is_active() && &a.condominium_id == condominium_id)
    }

    fn other_live_for_user(&self, subscription: &Subscription) -> bool {
        self.subscriptions
            .values()
            .any(|s| s.user_id == subscription.user_id && s.id != subscription.id && s.is_live())
    }
}

/// In-memory billing store.
#[derive(Default)]
pub struct InMemoryBillingStore {
    state: Mutex<State>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, DomainError> {
        self.state
            .lock()
            .map_err(|_| DomainError::new(ErrorCode::InternalError, "In-memory store lock poisoned"))
    }

    fn peek(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // === Seeding ===

    pub fn seed_plan(&self, plan: Plan) {
        self.peek().plans.insert(plan.id, plan);
    }

    /// Inserts a subscription without the live-uniqueness check.
    pub fn seed_subscription(&self, subscription: Subscription) {
        self.peek()
            .subscriptions
            .insert(subscription.id, subscription);
    }

    pub fn seed_allocation(&self, allocation: LicenseAllocation) {
        self.peek().allocations.push(allocation);
    }

    /// Registers the condominium owner, who is also an admin.
    pub fn seed_owner(&self, condominium_id: CondominiumId, owner: UserId) {
        let mut state = self.peek();
        state.owners.insert(condominium_id, owner);
        state.admins.insert((owner, condominium_id));
    }

    pub fn seed_admin(&self, condominium_id: CondominiumId, admin: UserId) {
        self.peek().admins.insert((admin, condominium_id));
    }

    // === Failure injection ===

    pub fn fail_on(&self, point: FailurePoint) {
        self.peek().failures.insert(point);
    }

    pub fn recover(&self, point: FailurePoint) {
        self.peek().failures.remove(&point);
    }

    // === Inspection ===

    pub fn subscription(&self, id: &SubscriptionId) -> Option<Subscription> {
        self.peek().subscriptions.get(id).cloned()
    }

    pub fn payment(&self, id: &PaymentId) -> Option<Payment> {
        self.peek().payments.iter().find(|p| &p.id == id).cloned()
    }

    pub fn transfer(&self, id: &TransferId) -> Option<AdminTransferPending> {
        self.peek().transfers.get(id).cloned()
    }

    pub fn allocations(&self) -> Vec<LicenseAllocation> {
        self.peek().allocations.clone()
    }

    pub fn active_allocations(&self, subscription_id: &SubscriptionId) -> u32 {
        self.peek().active_count(subscription_id)
    }

    pub fn admins_of(&self, condominium_id: &CondominiumId) -> Vec<UserId> {
        let mut admins: Vec<UserId> = self
            .peek()
            .admins
            .iter()
            .filter(|(_, c)| c == condominium_id)
            .map(|(u, _)| *u)
            .collect();
        admins.sort();
        admins
    }
}

// ════════════════════════════════════════════════════════════════
// Plans and subscriptions
// ════════════════════════════════════════════════════════════════

#[async_trait]
impl PlanCatalog for InMemoryBillingStore {
    async fn find_by_id(&self, id: &PlanId) -> Result<Option<Plan>, DomainError> {
        Ok(self.lock()?.plans.get(id).cloned())
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryBillingStore {
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut state = self.lock()?;
        state.check(FailurePoint::SubscriptionWrite)?;
        if subscription.is_live() && state.other_live_for_user(subscription) {
            return Err(DomainError::new(
                ErrorCode::SubscriptionExists,
                "User already has an active subscription",
            ));
        }
        state
            .subscriptions
            .insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn update(
        &self,
        subscription: &Subscription,
        expected_updated_at: Timestamp,
    ) -> Result<(), DomainError> {
        let mut state = self.lock()?;
        state.check(FailurePoint::SubscriptionWrite)?;
        let stored = state.subscriptions.get(&subscription.id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription {} not found", subscription.id),
            )
        })?;
        if stored.updated_at != expected_updated_at {
            return Err(DomainError::new(
                ErrorCode::ConcurrentModification,
                format!("Subscription {} was modified concurrently", subscription.id),
            ));
        }
        if subscription.is_live() && state.other_live_for_user(subscription) {
            return Err(DomainError::new(
                ErrorCode::SubscriptionExists,
                "User already has an active subscription",
            ));
        }
        state
            .subscriptions
            .insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        Ok(self.lock()?.subscriptions.get(id).cloned())
    }

    async fn find_live_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .lock()?
            .subscriptions
            .values()
            .find(|s| &s.user_id == user_id && s.is_live())
            .cloned())
    }
}

// ════════════════════════════════════════════════════════════════
// Payments
// ════════════════════════════════════════════════════════════════

#[async_trait]
impl PaymentLedger for InMemoryBillingStore {
    async fn create(&self, payment: &Payment) -> Result<(), DomainError> {
        self.lock()?.payments.push(payment.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        Ok(self.lock()?.payments.iter().find(|p| &p.id == id).cloned())
    }

    async fn find_by(&self, key: &PaymentLookup<'_>) -> Result<Option<Payment>, DomainError> {
        let state = self.lock()?;
        let found = state.payments.iter().find(|p| match key {
            PaymentLookup::RequestId(v) => p.request_id.as_deref() == Some(*v),
            PaymentLookup::OrderId(v) => p.order_id.as_deref() == Some(*v),
            PaymentLookup::ExternalPaymentId(v) => p.external_payment_id.as_deref() == Some(*v),
        });
        Ok(found.cloned())
    }

    async fn settle(
        &self,
        payment: &Payment,
        subscription: Option<SubscriptionWrite<'_>>,
    ) -> Result<SettleOutcome, DomainError> {
        let mut state = self.lock()?;
        state.check(FailurePoint::PaymentSettle)?;

        let stored_status = state
            .payments
            .iter()
            .find(|p| p.id == payment.id)
            .map(|p| p.status)
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::PaymentNotFound,
                    format!("Payment {} not found", payment.id),
                )
            })?;
        if stored_status != PaymentStatus::Pending {
            return Ok(SettleOutcome::AlreadySettled(stored_status));
        }

        if let Some(write) = &subscription {
            let stored = state
                .subscriptions
                .get(&write.subscription.id)
                .ok_or_else(|| {
                    DomainError::new(
                        ErrorCode::SubscriptionNotFound,
                        format!("Subscription {} not found", write.subscription.id),
                    )
                })?;
            if stored.updated_at != write.expected_updated_at {
                return Ok(SettleOutcome::SubscriptionChanged);
            }
        }

        if let Some(stored) = state.payments.iter_mut().find(|p| p.id == payment.id) {
            *stored = payment.clone();
        }
        if let Some(write) = subscription {
            state
                .subscriptions
                .insert(write.subscription.id, write.subscription.clone());
        }
        Ok(SettleOutcome::Applied)
    }
}

// ════════════════════════════════════════════════════════════════
// Licenses
// ════════════════════════════════════════════════════════════════

#[async_trait]
impl LicenseRepository for InMemoryBillingStore {
    async fn count_active(&self, subscription_id: &SubscriptionId) -> Result<u32, DomainError> {
        Ok(self.lock()?.active_count(subscription_id))
    }

    async fn find_active_for_condominium(
        &self,
        condominium_id: &CondominiumId,
    ) -> Result<Option<LicenseAllocation>, DomainError> {
        Ok(self.lock()?.active_for(condominium_id).map(|a| a.clone()))
    }

    async fn allocate(
        &self,
        subscription_id: &SubscriptionId,
        condominium_id: &CondominiumId,
        assigned_by: Option<UserId>,
        now: Timestamp,
    ) -> Result<AllocateOutcome, DomainError> {
        let mut state = self.lock()?;
        let license_count = match state.subscriptions.get(subscription_id) {
            Some(s) if s.is_live() => s.license_count,
            Some(_) => {
                return Err(DomainError::new(
                    ErrorCode::InvalidStateTransition,
                    "Subscription is canceled",
                ))
            }
            None => {
                return Err(DomainError::new(
                    ErrorCode::SubscriptionNotFound,
                    format!("Subscription {} not found", subscription_id),
                ))
            }
        };

        if state.active_for(condominium_id).is_some() {
            return Ok(AllocateOutcome::AlreadyAllocated);
        }
        let active = state.active_count(subscription_id);
        if active >= license_count {
            return Ok(AllocateOutcome::CapacityExceeded {
                active,
                license_count,
            });
        }

        let allocation =
            LicenseAllocation::assign(*subscription_id, *condominium_id, assigned_by, false, now);
        state.allocations.push(allocation.clone());
        Ok(AllocateOutcome::Allocated(allocation))
    }

    async fn release(
        &self,
        condominium_id: &CondominiumId,
        now: Timestamp,
    ) -> Result<Option<LicenseAllocation>, DomainError> {
        let mut state = self.lock()?;
        match state.active_for(condominium_id) {
            Some(allocation) => {
                allocation.release(now)?;
                Ok(Some(allocation.clone()))
            }
            None => Ok(None),
        }
    }

    async fn transfer(
        &self,
        transfer: &LicenseTransfer,
        now: Timestamp,
    ) -> Result<TransferOutcome, DomainError> {
        let mut state = self.lock()?;
        state.check(FailurePoint::LicenseTransfer)?;

        let holds = state
            .active_for(&transfer.condominium_id)
            .map(|a| a.subscription_id == transfer.from_subscription_id)
            .unwrap_or(false);
        if !holds {
            return Ok(TransferOutcome::SourceNotHolding);
        }

        let license_count = match state.subscriptions.get(&transfer.to_subscription_id) {
            Some(s) if s.is_live() => s.license_count,
            _ => return Ok(TransferOutcome::DestinationInactive),
        };
        let active = state.active_count(&transfer.to_subscription_id);
        if active >= license_count {
            return Ok(TransferOutcome::CapacityExceeded {
                active,
                license_count,
            });
        }

        let released = match state.active_for(&transfer.condominium_id) {
            Some(allocation) => {
                allocation.release(now)?;
                allocation.id
            }
            None => return Ok(TransferOutcome::SourceNotHolding),
        };
        let created = LicenseAllocation::assign(
            transfer.to_subscription_id,
            transfer.condominium_id,
            Some(transfer.acting_user_id),
            transfer.is_professional_transfer,
            now,
        );
        let created_id = created.id;
        state.allocations.push(created);

        Ok(TransferOutcome::Transferred {
            released,
            created: created_id,
        })
    }
}

// ════════════════════════════════════════════════════════════════
// Admin transfers and roles
// ════════════════════════════════════════════════════════════════

fn already_processed(transfer: &AdminTransferPending) -> DomainError {
    DomainError::new(
        ErrorCode::AlreadyProcessed,
        "This transfer has already been processed",
    )
    .with_detail("transfer_id", transfer.id.to_string())
}

#[async_trait]
impl AdminTransferRepository for InMemoryBillingStore {
    async fn create(
        &self,
        transfer: &NewAdminTransfer,
    ) -> Result<AdminTransferPending, DomainError> {
        let mut state = self.lock()?;
        state.last_transfer_id += 1;
        let created = AdminTransferPending {
            id: TransferId::from_db(state.last_transfer_id),
            condominium_id: transfer.condominium_id,
            user_id: transfer.user_id,
            assigned_by_user_id: transfer.assigned_by_user_id,
            status: TransferStatus::Pending,
            is_professional_transfer: transfer.is_professional_transfer,
            from_subscription_id: transfer.from_subscription_id,
            to_subscription_id: transfer.to_subscription_id,
            created_at: Timestamp::now(),
            decided_at: None,
        };
        state.transfers.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(
        &self,
        id: &TransferId,
    ) -> Result<Option<AdminTransferPending>, DomainError> {
        Ok(self.lock()?.transfers.get(id).cloned())
    }

    async fn list_pending_for(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AdminTransferPending>, DomainError> {
        Ok(self
            .lock()?
            .transfers
            .values()
            .filter(|t| &t.user_id == user_id && t.status == TransferStatus::Pending)
            .cloned()
            .collect())
    }

    async fn commit_acceptance(&self, transfer: &AdminTransferPending) -> Result<(), DomainError> {
        let mut state = self.lock()?;
        state.check(FailurePoint::TransferAcceptance)?;
        match state.transfers.get(&transfer.id) {
            Some(stored) if stored.status == TransferStatus::Pending => {}
            Some(_) => return Err(already_processed(transfer)),
            None => {
                return Err(DomainError::new(
                    ErrorCode::TransferNotFound,
                    format!("Transfer {} not found", transfer.id),
                ))
            }
        }
        state.transfers.insert(transfer.id, transfer.clone());
        state
            .admins
            .insert((transfer.user_id, transfer.condominium_id));
        Ok(())
    }

    async fn commit_rejection(&self, transfer: &AdminTransferPending) -> Result<(), DomainError> {
        let mut state = self.lock()?;
        match state.transfers.get(&transfer.id) {
            Some(stored) if stored.status == TransferStatus::Pending => {}
            Some(_) => return Err(already_processed(transfer)),
            None => {
                return Err(DomainError::new(
                    ErrorCode::TransferNotFound,
                    format!("Transfer {} not found", transfer.id),
                ))
            }
        }
        state.transfers.insert(transfer.id, transfer.clone());
        Ok(())
    }
}

#[async_trait]
impl AdminRoleDirectory for InMemoryBillingStore {
    async fn owner_of(
        &self,
        condominium_id: &CondominiumId,
    ) -> Result<Option<UserId>, DomainError> {
        Ok(self.lock()?.owners.get(condominium_id).copied())
    }

    async fn is_admin(
        &self,
        user_id: &UserId,
        condominium_id: &CondominiumId,
    ) -> Result<bool, DomainError> {
        Ok(self.lock()?.admins.contains(&(*user_id, *condominium_id)))
    }

    async fn revoke_admin(
        &self,
        user_id: &UserId,
        condominium_id: &CondominiumId,
    ) -> Result<bool, DomainError> {
        let mut state = self.lock()?;
        state.check(FailurePoint::RoleRevoke)?;
        Ok(state.admins.remove(&(*user_id, *condominium_id)))
    }
}
