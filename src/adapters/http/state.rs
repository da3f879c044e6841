//! Shared application state for the billing routes.

use std::sync::Arc;

use crate::application::handlers::licensing::CanCreateCondominiumHandler;
use crate::application::handlers::payment::ReconcilePaymentHandler;
use crate::application::handlers::subscription::{
    CancelSubscriptionHandler, ChangePlanHandler, GetSubscriptionHandler,
    ReactivateSubscriptionHandler, StartTrialHandler,
};
use crate::application::handlers::transfer::{
    AcceptAdminTransferHandler, ListPendingTransfersHandler, RejectAdminTransferHandler,
};
use crate::domain::payment::PaymentGateway;
use crate::ports::{
    AdminRoleDirectory, AdminTransferRepository, EventPublisher, LicenseRepository, Notifier,
    PaymentLedger, PlanCatalog, SubscriptionRepository,
};

/// Dependencies shared by every request.
///
/// Cloned per request; everything behind it is `Arc`-wrapped. Handlers are
/// built on demand from the ports.
#[derive(Clone)]
pub struct BillingAppState {
    pub plans: Arc<dyn PlanCatalog>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub ledger: Arc<dyn PaymentLedger>,
    pub licenses: Arc<dyn LicenseRepository>,
    pub transfers: Arc<dyn AdminTransferRepository>,
    pub roles: Arc<dyn AdminRoleDirectory>,
    pub notifier: Arc<dyn Notifier>,
    pub event_publisher: Arc<dyn EventPublisher>,
    pub gateway: Arc<PaymentGateway>,
    pub settings: HttpSettings,
}

/// Request-independent values taken from configuration.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Trial length used when a trial request names none.
    pub default_trial_days: u32,

    /// Redirect target after an admin transfer decision.
    pub pending_view_path: String,
}

impl BillingAppState {
    /// State backed by one store implementing every persistence port.
    pub fn from_store<S>(
        store: Arc<S>,
        notifier: Arc<dyn Notifier>,
        event_publisher: Arc<dyn EventPublisher>,
        gateway: PaymentGateway,
        settings: HttpSettings,
    ) -> Self
    where
        S: PlanCatalog
            + SubscriptionRepository
            + PaymentLedger
            + LicenseRepository
            + AdminTransferRepository
            + AdminRoleDirectory
            + 'static,
    {
        Self {
            plans: store.clone(),
            subscriptions: store.clone(),
            ledger: store.clone(),
            licenses: store.clone(),
            transfers: store.clone(),
            roles: store,
            notifier,
            event_publisher,
            gateway: Arc::new(gateway),
            settings,
        }
    }

    pub fn start_trial_handler(&self) -> StartTrialHandler {
        StartTrialHandler::new(
            self.plans.clone(),
            self.subscriptions.clone(),
            self.event_publisher.clone(),
        )
    }

    pub fn change_plan_handler(&self) -> ChangePlanHandler {
        ChangePlanHandler::new(
            self.plans.clone(),
            self.subscriptions.clone(),
            self.licenses.clone(),
            self.event_publisher.clone(),
        )
    }

    pub fn cancel_subscription_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(self.subscriptions.clone(), self.event_publisher.clone())
    }

    pub fn reactivate_subscription_handler(&self) -> ReactivateSubscriptionHandler {
        ReactivateSubscriptionHandler::new(self.subscriptions.clone(), self.event_publisher.clone())
    }

    pub fn get_subscription_handler(&self) -> GetSubscriptionHandler {
        GetSubscriptionHandler::new(self.subscriptions.clone(), self.licenses.clone())
    }

    pub fn can_create_condominium_handler(&self) -> CanCreateCondominiumHandler {
        CanCreateCondominiumHandler::new(self.subscriptions.clone(), self.licenses.clone())
    }

    pub fn reconcile_payment_handler(&self) -> ReconcilePaymentHandler {
        ReconcilePaymentHandler::new(
            self.ledger.clone(),
            self.subscriptions.clone(),
            self.event_publisher.clone(),
        )
    }

    pub fn accept_transfer_handler(&self) -> AcceptAdminTransferHandler {
        AcceptAdminTransferHandler::new(
            self.transfers.clone(),
            self.roles.clone(),
            self.subscriptions.clone(),
            self.licenses.clone(),
            self.notifier.clone(),
            self.event_publisher.clone(),
        )
    }

    pub fn reject_transfer_handler(&self) -> RejectAdminTransferHandler {
        RejectAdminTransferHandler::new(
            self.transfers.clone(),
            self.notifier.clone(),
            self.event_publisher.clone(),
        )
    }

    pub fn list_pending_transfers_handler(&self) -> ListPendingTransfersHandler {
        ListPendingTransfersHandler::new(self.transfers.clone())
    }
}
