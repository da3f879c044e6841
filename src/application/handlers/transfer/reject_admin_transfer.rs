//! RejectAdminTransferHandler - The invitee declines the offer.

use std::sync::Arc;

use crate::application::best_effort::{attempt, publish_events, StepOutcome};
use crate::domain::billing::BillingError;
use crate::domain::foundation::{EventId, SerializableDomainEvent, Timestamp, TransferId, UserId};
use crate::domain::transfer::{AdminTransferDecided, AdminTransferPending};
use crate::ports::{
    AdminTransferRepository, EventPublisher, Notification, NotificationKind, Notifier,
};

use super::accept_admin_transfer::load_for_invitee;

#[derive(Debug, Clone)]
pub struct RejectAdminTransferCommand {
    pub transfer_id: TransferId,
    pub acting_user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct RejectAdminTransferResult {
    pub transfer: AdminTransferPending,
    pub notification: StepOutcome<()>,
    pub events: StepOutcome<usize>,
}

pub struct RejectAdminTransferHandler {
    transfers: Arc<dyn AdminTransferRepository>,
    notifier: Arc<dyn Notifier>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl RejectAdminTransferHandler {
    pub fn new(
        transfers: Arc<dyn AdminTransferRepository>,
        notifier: Arc<dyn Notifier>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            transfers,
            notifier,
            event_publisher,
        }
    }

    pub async fn handle(
        &self,
        cmd: RejectAdminTransferCommand,
    ) -> Result<RejectAdminTransferResult, BillingError> {
        // 1. Load; only the invitee may decide
        let mut transfer =
            load_for_invitee(self.transfers.as_ref(), &cmd.transfer_id, &cmd.acting_user_id)
                .await?;

        // 2. Mark rejected
        let now = Timestamp::now();
        transfer.reject(now)?;
        self.transfers.commit_rejection(&transfer).await?;
        tracing::info!(
            transfer_id = %transfer.id,
            condominium_id = %transfer.condominium_id,
            "admin transfer rejected"
        );

        // 3. Tell the assigner (best-effort)
        let notification = attempt(
            "notify",
            self.notifier.notify(Notification {
                recipient: transfer.assigned_by_user_id,
                kind: NotificationKind::TransferRejected,
                condominium_id: transfer.condominium_id,
                transfer_id: transfer.id,
            }),
        )
        .await;

        // 4. Publish (best-effort)
        let event = AdminTransferDecided {
            event_id: EventId::new(),
            transfer_id: transfer.id,
            condominium_id: transfer.condominium_id,
            invitee_user_id: transfer.user_id,
            assigned_by_user_id: transfer.assigned_by_user_id,
            decision: transfer.status,
            demoted_user_id: None,
            decided_at: now,
        };
        let envelope = event.to_envelope().with_user_id(cmd.acting_user_id.to_string());
        let events = publish_events(self.event_publisher.as_ref(), vec![envelope]).await;

        Ok(RejectAdminTransferResult {
            transfer,
            notification,
            events,
        })
    }
}
