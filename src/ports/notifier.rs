//! Notification port (fire-and-forget).

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::foundation::{CondominiumId, DomainError, TransferId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// To the assigner: the invitee accepted.
    TransferAccepted,
    /// To the assigner: the invitee declined.
    TransferRejected,
    /// To the prior admin: their role was removed.
    AdminRoleRemoved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub condominium_id: CondominiumId,
    pub transfer_id: TransferId,
}

/// Delivers user notifications (email, in-app).
///
/// Callers treat every failure as best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifier_is_object_safe() {
        fn _accepts_dyn(_notifier: &dyn Notifier) {}
    }
}
