//! CancelSubscriptionHandler - Command handler for explicit cancellation.
//!
//! Allocations are not touched; they stay until released separately.

use std::sync::Arc;

use crate::application::best_effort::{publish_events, StepOutcome};
use crate::domain::billing::{BillingError, Subscription, SubscriptionChange, SubscriptionEvent};
use crate::domain::foundation::{
    DomainError, ErrorCode, SerializableDomainEvent, SubscriptionId, Timestamp, UserId,
};
use crate::ports::{EventPublisher, SubscriptionRepository};

use super::MAX_UPDATE_ATTEMPTS;

#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub subscription_id: SubscriptionId,
    pub requested_by: UserId,
}

#[derive(Debug, Clone)]
pub struct CancelSubscriptionResult {
    pub subscription: Subscription,
    pub events: StepOutcome<usize>,
}

pub struct CancelSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl CancelSubscriptionHandler {
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
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, BillingError> {
        let mut attempt = 1;
        let subscription = loop {
            // 1. Load and check ownership
            let mut subscription = load_owned(
                self.subscriptions.as_ref(),
                &cmd.subscription_id,
                &cmd.requested_by,
            )
            .await?;

            // 2. Transition (any live status may cancel)
            let expected_updated_at = subscription.updated_at;
            subscription.cancel(Timestamp::now())?;

            // 3. Persist against the version just read
            match self.subscriptions.update(&subscription, expected_updated_at).await {
                Ok(()) => break subscription,
                Err(err) if retryable(&err, attempt) => {
                    tracing::debug!(
                        subscription_id = %subscription.id,
                        attempt,
                        "subscription changed during cancellation, retrying"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        };
        tracing::info!(subscription_id = %subscription.id, "subscription canceled");

        // 4. Publish
        let event = SubscriptionEvent::new(SubscriptionChange::Canceled, &subscription);
        let envelope = event.to_envelope().with_user_id(cmd.requested_by.to_string());
        let events = publish_events(self.event_publisher.as_ref(), vec![envelope]).await;

        Ok(CancelSubscriptionResult {
            subscription,
            events,
        })
    }
}

/// Whether a failed update lost a race and another round is allowed.
pub(super) fn retryable(err: &DomainError, attempt: usize) -> bool {
    err.code == ErrorCode::ConcurrentModification && attempt < MAX_UPDATE_ATTEMPTS
}

/// Loads a subscription the requester owns.
pub(super) async fn load_owned(
    subscriptions: &dyn SubscriptionRepository,
    id: &SubscriptionId,
    requested_by: &UserId,
) -> Result<Subscription, BillingError> {
    let subscription = subscriptions
        .find_by_id(id)
        .await?
        .ok_or_else(|| BillingError::not_found(format!("Subscription {} not found", id)))?;
    if &subscription.user_id != requested_by {
        return Err(BillingError::forbidden(
            "Subscription belongs to another user",
        ));
    }
    Ok(subscription)
}
