//! AcceptAdminTransferHandler - Hands a condominium to the invitee.
//!
//! # Failure policy
//!
//! | Step | On failure |
//! |------|------------|
//! | Mark accepted and grant the admin role (one unit of work) | Operation fails, nothing written |
//! | Move the license to the invitee's subscription | Logged, acceptance stands |
//! | Remove the superseded admin (never the owner) | Logged, acceptance stands |
//! | Notify assigner and demoted admin | Logged, acceptance stands |
//! | Publish decision event | Logged, acceptance stands |
//!
//! Secondary steps run only after the primary unit of work has committed
//! and each runs on its own.

use std::sync::Arc;

use crate::application::best_effort::{attempt, publish_events, StepOutcome};
use crate::application::handlers::licensing::{
    TransferLicensesCommand, TransferLicensesHandler, TransferLicensesResult,
};
use crate::domain::billing::BillingError;
use crate::domain::foundation::{EventId, SerializableDomainEvent, Timestamp, TransferId, UserId};
use crate::domain::transfer::{AdminTransferDecided, AdminTransferPending};
use crate::ports::{
    AdminRoleDirectory, AdminTransferRepository, EventPublisher, LicenseRepository, Notification,
    NotificationKind, Notifier, SubscriptionRepository,
};

#[derive(Debug, Clone)]
pub struct AcceptAdminTransferCommand {
    pub transfer_id: TransferId,
    pub acting_user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct AcceptAdminTransferResult {
    pub transfer: AdminTransferPending,
    pub license_transfer: StepOutcome<TransferLicensesResult>,

    /// The admin removed from the condominium.
    pub demotion: StepOutcome<UserId>,

    pub notifications: Vec<StepOutcome<NotificationKind>>,
    pub events: StepOutcome<usize>,
}

pub struct AcceptAdminTransferHandler {
    transfers: Arc<dyn AdminTransferRepository>,
    roles: Arc<dyn AdminRoleDirectory>,
    license_transfers: TransferLicensesHandler,
    notifier: Arc<dyn Notifier>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl AcceptAdminTransferHandler {
    pub fn new(
        transfers: Arc<dyn AdminTransferRepository>,
        roles: Arc<dyn AdminRoleDirectory>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        licenses: Arc<dyn LicenseRepository>,
        notifier: Arc<dyn Notifier>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            transfers,
            roles,
            license_transfers: TransferLicensesHandler::new(subscriptions, licenses),
            notifier,
            event_publisher,
        }
    }

    pub async fn handle(
        &self,
        cmd: AcceptAdminTransferCommand,
    ) -> Result<AcceptAdminTransferResult, BillingError> {
        // 1. Load; only the invitee may decide
        let mut transfer =
            load_for_invitee(self.transfers.as_ref(), &cmd.transfer_id, &cmd.acting_user_id)
                .await?;

        // 2. Mark accepted and grant the role in one unit of work
        let now = Timestamp::now();
        transfer.accept(now)?;
        self.transfers.commit_acceptance(&transfer).await?;
        tracing::info!(
            transfer_id = %transfer.id,
            condominium_id = %transfer.condominium_id,
            new_admin = %transfer.user_id,
            "admin transfer accepted"
        );

        // 3. License bookkeeping (best-effort)
        let license_transfer = match transfer.license_route() {
            Some((from, to)) => {
                attempt(
                    "transfer_license",
                    self.license_transfers.handle(TransferLicensesCommand {
                        condominium_id: transfer.condominium_id,
                        from_subscription_id: from,
                        to_subscription_id: to,
                        acting_user_id: transfer.user_id,
                        is_professional_transfer: true,
                    }),
                )
                .await
            }
            None => StepOutcome::skipped("no license moves with this transfer"),
        };

        // 4. Demote the superseded admin once the license has moved
        let demotion = if license_transfer.is_completed() {
            self.demote_superseded_admin(&transfer).await
        } else {
            StepOutcome::skipped("license did not move")
        };

        // 5. Notify (best-effort)
        let mut notifications = vec![
            self.notify(&transfer, transfer.assigned_by_user_id, NotificationKind::TransferAccepted)
                .await,
        ];
        if let Some(demoted) = demotion.completed() {
            notifications.push(
                self.notify(&transfer, *demoted, NotificationKind::AdminRoleRemoved)
                    .await,
            );
        }

        // 6. Publish (best-effort)
        let event = AdminTransferDecided {
            event_id: EventId::new(),
            transfer_id: transfer.id,
            condominium_id: transfer.condominium_id,
            invitee_user_id: transfer.user_id,
            assigned_by_user_id: transfer.assigned_by_user_id,
            decision: transfer.status,
            demoted_user_id: demotion.completed().copied(),
            decided_at: now,
        };
        let envelope = event.to_envelope().with_user_id(cmd.acting_user_id.to_string());
        let events = publish_events(self.event_publisher.as_ref(), vec![envelope]).await;

        Ok(AcceptAdminTransferResult {
            transfer,
            license_transfer,
            demotion,
            notifications,
            events,
        })
    }

    async fn demote_superseded_admin(&self, transfer: &AdminTransferPending) -> StepOutcome<UserId> {
        let superseded = transfer.assigned_by_user_id;
        if superseded == transfer.user_id {
            return StepOutcome::skipped("superseded admin is the new admin");
        }

        let owner = match attempt("lookup_owner", self.roles.owner_of(&transfer.condominium_id)).await
        {
            StepOutcome::Completed(owner) => owner,
            StepOutcome::Skipped(reason) => return StepOutcome::Skipped(reason),
            StepOutcome::Failed(error) => return StepOutcome::Failed(error),
        };
        if owner == Some(superseded) {
            return StepOutcome::skipped("owners are never demoted");
        }

        match attempt(
            "revoke_admin",
            self.roles.revoke_admin(&superseded, &transfer.condominium_id),
        )
        .await
        {
            StepOutcome::Completed(true) => {
                tracing::info!(
                    transfer_id = %transfer.id,
                    condominium_id = %transfer.condominium_id,
                    demoted = %superseded,
                    "superseded admin removed"
                );
                StepOutcome::Completed(superseded)
            }
            StepOutcome::Completed(false) => StepOutcome::skipped("superseded admin held no role"),
            StepOutcome::Skipped(reason) => StepOutcome::Skipped(reason),
            StepOutcome::Failed(error) => StepOutcome::Failed(error),
        }
    }

    async fn notify(
        &self,
        transfer: &AdminTransferPending,
        recipient: UserId,
        kind: NotificationKind,
    ) -> StepOutcome<NotificationKind> {
        let notification = Notification {
            recipient,
            kind,
            condominium_id: transfer.condominium_id,
            transfer_id: transfer.id,
        };
        attempt("notify", self.notifier.notify(notification))
            .await
            .map(|_| kind)
    }
}

/// Loads a transfer the acting user was invited to.
pub(super) async fn load_for_invitee(
    transfers: &dyn AdminTransferRepository,
    transfer_id: &TransferId,
    acting_user_id: &UserId,
) -> Result<AdminTransferPending, BillingError> {
    let transfer = transfers
        .find_by_id(transfer_id)
        .await?
        .ok_or_else(|| BillingError::not_found("Transfer not found"))?;
    if &transfer.user_id != acting_user_id {
        return Err(BillingError::forbidden(
            "Only the invited user can respond to this transfer",
        ));
    }
    Ok(transfer)
}
