//! GetSubscriptionHandler - Query handler for the caller's live subscription.

use std::sync::Arc;

use crate::domain::billing::{BillingError, Subscription};
use crate::domain::foundation::UserId;
use crate::ports::{LicenseRepository, SubscriptionRepository};

#[derive(Debug, Clone)]
pub struct GetSubscriptionQuery {
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct GetSubscriptionResult {
    /// `None` when the user has no live subscription.
    pub subscription: Option<Subscription>,
    pub active_licenses: u32,
}

pub struct GetSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    licenses: Arc<dyn LicenseRepository>,
}

impl GetSubscriptionHandler {
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
        query: GetSubscriptionQuery,
    ) -> Result<GetSubscriptionResult, BillingError> {
        let subscription = self.subscriptions.find_live_by_user(&query.user_id).await?;
        let active_licenses = match &subscription {
            Some(sub) => self.licenses.count_active(&sub.id).await?,
            None => 0,
        };
        Ok(GetSubscriptionResult {
            subscription,
            active_licenses,
        })
    }
}
