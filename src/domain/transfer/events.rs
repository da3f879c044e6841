//! Admin transfer decision events.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    domain_event, CondominiumId, EventId, Timestamp, TransferId, UserId,
};

use super::TransferStatus;

/// Emitted once a transfer has been accepted or rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminTransferDecided {
    pub event_id: EventId,
    pub transfer_id: TransferId,
    pub condominium_id: CondominiumId,
    pub invitee_user_id: UserId,
    pub assigned_by_user_id: UserId,
    pub decision: TransferStatus,

    /// Prior admin removed from the condominium, if any.
    pub demoted_user_id: Option<UserId>,

    pub decided_at: Timestamp,
}

domain_event!(
    AdminTransferDecided,
    event_type = "admin_transfer.decided.v1",
    aggregate_id = transfer_id,
    aggregate_type = "AdminTransfer",
    occurred_at = decided_at,
    event_id = event_id
);
