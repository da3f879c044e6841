//! TransferLicensesHandler - Moves a condominium's license between
//! subscriptions.
//!
//! The check-release-create sequence runs as one unit of work inside the
//! repository. Any outcome other than `Transferred` means nothing changed.

use std::sync::Arc;

use crate::domain::billing::BillingError;
use crate::domain::foundation::{AllocationId, CondominiumId, SubscriptionId, Timestamp, UserId};
use crate::domain::licensing::{LicenseTransfer, TransferOutcome};
use crate::ports::{LicenseRepository, SubscriptionRepository};

#[derive(Debug, Clone)]
pub struct TransferLicensesCommand {
    pub condominium_id: CondominiumId,
    pub from_subscription_id: SubscriptionId,
    pub to_subscription_id: SubscriptionId,
    pub acting_user_id: UserId,
    pub is_professional_transfer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLicensesResult {
    pub released: AllocationId,
    pub created: AllocationId,
}

pub struct TransferLicensesHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    licenses: Arc<dyn LicenseRepository>,
}

impl TransferLicensesHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        licenses: Arc<dyn LicenseRepository>,
    ) -> Self {
        Self {
            subscriptions,
            licenses,
        }
    }

    pub async fn handle(
        &self,
        cmd: TransferLicensesCommand,
    ) -> Result<TransferLicensesResult, BillingError> {
        if cmd.from_subscription_id == cmd.to_subscription_id {
            return Err(BillingError::validation(
                "Source and destination subscriptions must differ",
            ));
        }

        if self
            .subscriptions
            .find_by_id(&cmd.to_subscription_id)
            .await?
            .is_none()
        {
            return Err(BillingError::not_found(format!(
                "Subscription {} not found",
                cmd.to_subscription_id
            )));
        }

        let transfer = LicenseTransfer {
            condominium_id: cmd.condominium_id,
            from_subscription_id: cmd.from_subscription_id,
            to_subscription_id: cmd.to_subscription_id,
            acting_user_id: cmd.acting_user_id,
            is_professional_transfer: cmd.is_professional_transfer,
        };

        match self.licenses.transfer(&transfer, Timestamp::now()).await? {
            TransferOutcome::Transferred { released, created } => {
                tracing::info!(
                    condominium_id = %cmd.condominium_id,
                    from = %cmd.from_subscription_id,
                    to = %cmd.to_subscription_id,
                    professional = cmd.is_professional_transfer,
                    "license transferred"
                );
                Ok(TransferLicensesResult { released, created })
            }
            TransferOutcome::SourceNotHolding => Err(BillingError::not_found(format!(
                "Subscription {} holds no active license for condominium {}",
                cmd.from_subscription_id, cmd.condominium_id
            ))),
            TransferOutcome::CapacityExceeded {
                active,
                license_count,
            } => Err(BillingError::capacity_exceeded(format!(
                "Destination subscription has no spare license ({} of {} in use)",
                active, license_count
            ))),
            TransferOutcome::DestinationInactive => Err(BillingError::invalid_state(format!(
                "Subscription {} is not active",
                cmd.to_subscription_id
            ))),
        }
    }
}
