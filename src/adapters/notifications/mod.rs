//! Notifier adapters.
//!
//! - `LoggingNotifier` - Hands notifications to the log stream for the
//!   delivery service to pick up
//! - `InMemoryNotifier` - Captures notifications for tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{Notification, Notifier};

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), DomainError> {
        tracing::info!(
            recipient = %notification.recipient,
            kind = ?notification.kind,
            condominium_id = %notification.condominium_id,
            transfer_id = %notification.transfer_id,
            "notification queued"
        );
        Ok(())
    }
}

/// Captures notifications; can be switched to fail.
#[derive(Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::CollaboratorUnavailable,
                "Simulated notification outage",
            ));
        }
        self.sent
            .lock()
            .map_err(|_| DomainError::new(ErrorCode::InternalError, "Notifier lock poisoned"))?
            .push(notification);
        Ok(())
    }
}
