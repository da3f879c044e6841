//! OfferAdminTransferHandler - Invites another account to administer a
//! condominium.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::{CondominiumId, SubscriptionId, UserId};
use crate::domain::transfer::{AdminTransferPending, NewAdminTransfer};
use crate::ports::{AdminRoleDirectory, AdminTransferRepository};

#[derive(Debug, Clone)]
pub struct OfferAdminTransferCommand {
    pub condominium_id: CondominiumId,
    pub invitee: UserId,
    pub assigned_by: UserId,
    pub is_professional_transfer: bool,
    pub from_subscription_id: Option<SubscriptionId>,
    pub to_subscription_id: Option<SubscriptionId>,
}

pub struct OfferAdminTransferHandler {
    transfers: Arc<dyn AdminTransferRepository>,
    roles: Arc<dyn AdminRoleDirectory>,
}

impl OfferAdminTransferHandler {
    pub fn new(
        transfers: Arc<dyn AdminTransferRepository>,
        roles: Arc<dyn AdminRoleDirectory>,
    ) -> Self {
        Self { transfers, roles }
    }

    pub async fn handle(
        &self,
        cmd: OfferAdminTransferCommand,
    ) -> Result<AdminTransferPending, BillingError> {
        if cmd.invitee == cmd.assigned_by {
            return Err(BillingError::validation("You cannot invite yourself"));
        }
        if let (Some(from), Some(to)) = (cmd.from_subscription_id, cmd.to_subscription_id) {
            if from == to {
                return Err(BillingError::validation(
                    "Source and destination subscriptions must differ",
                ));
            }
        }

        if !self
            .roles
            .is_admin(&cmd.assigned_by, &cmd.condominium_id)
            .await?
        {
            return Err(BillingError::forbidden(
                "Only a current admin can offer this condominium",
            ));
        }

        let transfer = self
            .transfers
            .create(&NewAdminTransfer {
                condominium_id: cmd.condominium_id,
                user_id: cmd.invitee,
                assigned_by_user_id: cmd.assigned_by,
                is_professional_transfer: cmd.is_professional_transfer,
                from_subscription_id: cmd.from_subscription_id,
                to_subscription_id: cmd.to_subscription_id,
            })
            .await?;

        tracing::info!(
            transfer_id = %transfer.id,
            condominium_id = %transfer.condominium_id,
            invitee = %transfer.user_id,
            professional = transfer.is_professional_transfer,
            "admin transfer offered"
        );
        Ok(transfer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::{condo, user, Fixture};
    use crate::domain::transfer::TransferStatus;

    fn command(assigned_by: i64, invitee: i64) -> OfferAdminTransferCommand {
        OfferAdminTransferCommand {
            condominium_id: condo(10),
            invitee: user(invitee),
            assigned_by: user(assigned_by),
            is_professional_transfer: false,
            from_subscription_id: None,
            to_subscription_id: None,
        }
    }

    #[tokio::test]
    async fn admin_can_offer() {
        let f = Fixture::new();
        f.store.seed_owner(condo(10), user(1));
        let handler = OfferAdminTransferHandler::new(f.store.clone(), f.store.clone());

        let transfer = handler.handle(command(1, 2)).await.unwrap();

        assert_eq!(transfer.status, TransferStatus::Pending);
        assert_eq!(transfer.user_id, user(2));
        assert!(f.store.transfer(&transfer.id).is_some());
    }

    #[tokio::test]
    async fn non_admin_cannot_offer() {
        let f = Fixture::new();
        f.store.seed_owner(condo(10), user(1));
        let handler = OfferAdminTransferHandler::new(f.store.clone(), f.store.clone());

        let err = handler.handle(command(3, 2)).await.unwrap_err();

        assert!(matches!(err, BillingError::Forbidden(_)));
    }

    #[tokio::test]
    async fn self_invitation_is_rejected() {
        let f = Fixture::new();
        f.store.seed_owner(condo(10), user(1));
        let handler = OfferAdminTransferHandler::new(f.store.clone(), f.store.clone());

        let err = handler.handle(command(1, 1)).await.unwrap_err();

        assert!(matches!(err, BillingError::Validation(_)));
    }
}
