//! Pending transfer of administrative control over a condominium.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    CondominiumId, DomainError, ErrorCode, StateMachine, SubscriptionId, Timestamp, TransferId,
    UserId,
};

/// Transfer status. `Accepted` and `Rejected` are terminal; a transfer is
/// never re-opened (re-invitation creates a new record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Accepted,
    Rejected,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Accepted => "accepted",
            TransferStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransferStatus::Pending),
            "accepted" => Some(TransferStatus::Accepted),
            "rejected" => Some(TransferStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for TransferStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use TransferStatus::*;
        matches!((self, target), (Pending, Accepted) | (Pending, Rejected))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use TransferStatus::*;
        match self {
            Pending => vec![Accepted, Rejected],
            Accepted | Rejected => vec![],
        }
    }
}

/// Offer of the admin role on a condominium to another account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminTransferPending {
    pub id: TransferId,
    pub condominium_id: CondominiumId,

    /// The invitee.
    pub user_id: UserId,

    /// The admin who made the offer.
    pub assigned_by_user_id: UserId,

    pub status: TransferStatus,

    /// Billing responsibility moves with the role.
    pub is_professional_transfer: bool,

    pub from_subscription_id: Option<SubscriptionId>,
    pub to_subscription_id: Option<SubscriptionId>,
    pub created_at: Timestamp,
    pub decided_at: Option<Timestamp>,
}

/// Fields needed to create a transfer; the id is assigned by storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdminTransfer {
    pub condominium_id: CondominiumId,
    pub user_id: UserId,
    pub assigned_by_user_id: UserId,
    pub is_professional_transfer: bool,
    pub from_subscription_id: Option<SubscriptionId>,
    pub to_subscription_id: Option<SubscriptionId>,
}

impl AdminTransferPending {
    /// Subscriptions to move the license between, when both are known and
    /// the transfer carries billing responsibility.
    pub fn license_route(&self) -> Option<(SubscriptionId, SubscriptionId)> {
        if !self.is_professional_transfer {
            return None;
        }
        Some((self.from_subscription_id?, self.to_subscription_id?))
    }

    pub fn accept(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.decide(TransferStatus::Accepted, now)
    }

    pub fn reject(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.decide(TransferStatus::Rejected, now)
    }

    fn decide(&mut self, target: TransferStatus, now: Timestamp) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::AlreadyProcessed,
                format!("This transfer has already been {}", self.status),
            )
            .with_detail("transfer_id", self.id.to_string())
        })?;
        self.decided_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn pending_transfer(id: i64, professional: bool) -> AdminTransferPending {
        AdminTransferPending {
            id: TransferId::new(id).unwrap(),
            condominium_id: CondominiumId::new(100).unwrap(),
            user_id: UserId::new(2).unwrap(),
            assigned_by_user_id: UserId::new(1).unwrap(),
            status: TransferStatus::Pending,
            is_professional_transfer: professional,
            from_subscription_id: professional.then(SubscriptionId::new),
            to_subscription_id: professional.then(SubscriptionId::new),
            created_at: Timestamp::now(),
            decided_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::pending_transfer;
    use super::*;

    #[test]
    fn accept_marks_decided() {
        let mut transfer = pending_transfer(1, false);
        let now = Timestamp::now();
        transfer.accept(now).unwrap();
        assert_eq!(transfer.status, TransferStatus::Accepted);
        assert_eq!(transfer.decided_at, Some(now));
    }

    #[test]
    fn decided_transfer_cannot_be_decided_again() {
        let mut transfer = pending_transfer(1, false);
        transfer.reject(Timestamp::now()).unwrap();

        let err = transfer.accept(Timestamp::now()).unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyProcessed);
        assert_eq!(transfer.status, TransferStatus::Rejected);

        assert!(transfer.reject(Timestamp::now()).is_err());
    }

    #[test]
    fn license_route_requires_professional_and_both_ids() {
        let professional = pending_transfer(1, true);
        assert!(professional.license_route().is_some());

        let mut missing_to = pending_transfer(2, true);
        missing_to.to_subscription_id = None;
        assert!(missing_to.license_route().is_none());

        assert!(pending_transfer(3, false).license_route().is_none());
    }

    #[test]
    fn terminal_statuses() {
        assert!(TransferStatus::Accepted.is_terminal());
        assert!(TransferStatus::Rejected.is_terminal());
        assert!(!TransferStatus::Pending.is_terminal());
    }
}
