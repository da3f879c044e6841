//! ListPendingTransfersHandler - Query handler for the pending view.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::UserId;
use crate::domain::transfer::AdminTransferPending;
use crate::ports::AdminTransferRepository;

#[derive(Debug, Clone)]
pub struct ListPendingTransfersQuery {
    pub user_id: UserId,
}

pub struct ListPendingTransfersHandler {
    transfers: Arc<dyn AdminTransferRepository>,
}

impl ListPendingTransfersHandler {
    pub fn new(transfers: Arc<dyn AdminTransferRepository>) -> Self {
        Self { transfers }
    }

    /// Transfers awaiting a decision by the user, oldest first.
    pub async fn handle(
        &self,
        query: ListPendingTransfersQuery,
    ) -> Result<Vec<AdminTransferPending>, BillingError> {
        let mut pending = self.transfers.list_pending_for(&query.user_id).await?;
        pending.sort_by_key(|t| (t.created_at, t.id));
        Ok(pending)
    }
}
