//! ReleaseLicenseHandler - Frees the capacity a condominium consumes.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::{CondominiumId, Timestamp};
use crate::domain::licensing::LicenseAllocation;
use crate::ports::LicenseRepository;

#[derive(Debug, Clone)]
pub struct ReleaseLicenseCommand {
    pub condominium_id: CondominiumId,
}

pub struct ReleaseLicenseHandler {
    licenses: Arc<dyn LicenseRepository>,
}

impl ReleaseLicenseHandler {
    pub fn new(licenses: Arc<dyn LicenseRepository>) -> Self {
        Self { licenses }
    }

    pub async fn handle(
        &self,
        cmd: ReleaseLicenseCommand,
    ) -> Result<LicenseAllocation, BillingError> {
        let released = self
            .licenses
            .release(&cmd.condominium_id, Timestamp::now())
            .await?
            .ok_or_else(|| {
                BillingError::not_found(format!(
                    "Condominium {} holds no active license",
                    cmd.condominium_id
                ))
            })?;

        tracing::info!(
            subscription_id = %released.subscription_id,
            condominium_id = %released.condominium_id,
            "license released"
        );
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::{condo, Fixture};
    use crate::domain::billing::SubscriptionStatus;

    #[tokio::test]
    async fn release_sets_released_at_once() {
        let f = Fixture::new();
        let sub = f.subscription(1, SubscriptionStatus::Active, 1);
        f.store.seed_allocation(LicenseAllocation::assign(
            sub.id,
            condo(10),
            None,
            false,
            Timestamp::now(),
        ));
        let handler = ReleaseLicenseHandler::new(f.store.clone());
        let cmd = ReleaseLicenseCommand {
            condominium_id: condo(10),
        };

        let released = handler.handle(cmd.clone()).await.unwrap();
        assert!(released.released_at.is_some());
        assert_eq!(f.store.active_allocations(&sub.id), 0);

        let err = handler.handle(cmd).await.unwrap_err();
        assert!(matches!(err, BillingError::NotFound(_)));
    }
}
