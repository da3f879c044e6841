//! ReactivateSubscriptionHandler - Command handler for reopening a
//! canceled subscription with a fresh billing window.

use std::sync::Arc;

use crate::application::best_effort::{publish_events, StepOutcome};
use crate::domain::billing::{BillingError, Subscription, SubscriptionChange, SubscriptionEvent};
use crate::domain::foundation::{SerializableDomainEvent, SubscriptionId, Timestamp, UserId};
use crate::ports::{EventPublisher, SubscriptionRepository};

use super::cancel_subscription::{load_owned, retryable};

#[derive(Debug, Clone)]
pub struct ReactivateSubscriptionCommand {
    pub subscription_id: SubscriptionId,
    pub requested_by: UserId,
}

#[derive(Debug, Clone)]
pub struct ReactivateSubscriptionResult {
    pub subscription: Subscription,
    pub events: StepOutcome<usize>,
}

pub struct ReactivateSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl ReactivateSubscriptionHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            subscriptions,
            event_publisher,
        }
    }

    pub async fn handle(
        &self,
        cmd: ReactivateSubscriptionCommand,
    ) -> Result<ReactivateSubscriptionResult, BillingError> {
        let mut attempt = 1;
        let subscription = loop {
            let mut subscription = load_owned(
                self.subscriptions.as_ref(),
                &cmd.subscription_id,
                &cmd.requested_by,
            )
            .await?;

            // Only from canceled
            let expected_updated_at = subscription.updated_at;
            subscription.reactivate(Timestamp::now())?;

            // Conflicts if the user opened another subscription meanwhile
            match self.subscriptions.update(&subscription, expected_updated_at).await {
                Ok(()) => break subscription,
                Err(err) if retryable(&err, attempt) => {
                    tracing::debug!(
                        subscription_id = %subscription.id,
                        attempt,
                        "subscription changed during reactivation, retrying"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        };
        tracing::info!(
            subscription_id = %subscription.id,
            period_end = %subscription.current_period_end,
            "subscription reactivated"
        );

        let event = SubscriptionEvent::new(SubscriptionChange::Reactivated, &subscription);
        let envelope = event.to_envelope().with_user_id(cmd.requested_by.to_string());
        let events = publish_events(self.event_publisher.as_ref(), vec![envelope]).await;

        Ok(ReactivateSubscriptionResult {
            subscription,
            events,
        })
    }
}
