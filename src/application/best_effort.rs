//! Secondary steps that may fail without failing the operation.
//!
//! Primary steps return `Result` and abort on error. Secondary steps
//! (license bookkeeping, demotion, notifications, event publication) run
//! after the primary unit of work has committed through [`attempt`], which
//! logs a failure and records it as a [`StepOutcome`] instead of
//! propagating it.

use std::fmt::Display;
use std::future::Future;

use serde::Serialize;

use crate::domain::foundation::EventEnvelope;
use crate::ports::EventPublisher;

/// Result of a best-effort step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome<T> {
    Completed(T),

    /// The step did not apply; the reason says why.
    Skipped(String),

    /// The step ran and failed. Needs out-of-band reconciliation.
    Failed(String),
}

impl<T> StepOutcome<T> {
    pub fn skipped(reason: impl Into<String>) -> Self {
        StepOutcome::Skipped(reason.into())
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            StepOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StepOutcome<U> {
        match self {
            StepOutcome::Completed(value) => StepOutcome::Completed(f(value)),
            StepOutcome::Skipped(reason) => StepOutcome::Skipped(reason),
            StepOutcome::Failed(error) => StepOutcome::Failed(error),
        }
    }
}

/// Runs a secondary step, logging and capturing its failure.
pub async fn attempt<T, E, F>(step: &'static str, fut: F) -> StepOutcome<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match fut.await {
        Ok(value) => StepOutcome::Completed(value),
        Err(error) => {
            tracing::warn!(step, error = %error, "best-effort step failed");
            StepOutcome::Failed(error.to_string())
        }
    }
}

/// Publishes events after commit. A failure never undoes the change.
pub async fn publish_events(
    publisher: &dyn EventPublisher,
    events: Vec<EventEnvelope>,
) -> StepOutcome<usize> {
    let count = events.len();
    attempt("publish_events", publisher.publish_all(events))
        .await
        .map(|_| count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::domain::foundation::{DomainError, ErrorCode};
    use serde_json::json;

    #[tokio::test]
    async fn attempt_wraps_success() {
        let outcome = attempt("ok", async { Ok::<_, DomainError>(7) }).await;
        assert_eq!(outcome, StepOutcome::Completed(7));
        assert!(outcome.is_completed());
    }

    #[tokio::test]
    async fn attempt_captures_failure_message() {
        let outcome: StepOutcome<()> = attempt("boom", async {
            Err(DomainError::new(ErrorCode::CollaboratorUnavailable, "smtp down"))
        })
        .await;

        assert!(outcome.is_failed());
        assert_eq!(
            outcome,
            StepOutcome::Failed("[COLLABORATOR_UNAVAILABLE] smtp down".to_string())
        );
    }

    #[tokio::test]
    async fn publish_events_reports_count_or_failure() {
        let bus = InMemoryEventBus::new();
        let events = vec![EventEnvelope::new("a.v1", "1", "Test", json!({}))];

        assert_eq!(
            publish_events(&bus, events.clone()).await,
            StepOutcome::Completed(1)
        );

        bus.set_failing(true);
        assert!(publish_events(&bus, events).await.is_failed());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(StepOutcome::<()>::skipped("owner")).unwrap();
        assert_eq!(json, json!({"outcome": "skipped", "detail": "owner"}));
    }
}
