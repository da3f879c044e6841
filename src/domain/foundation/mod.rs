//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, error types, the state machine contract and
//! event plumbing shared by the billing, licensing, payment and transfer
//! modules.

mod errors;
mod events;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{
    domain_event, DomainEvent, EventEnvelope, EventId, EventMetadata, SerializableDomainEvent,
};
pub use ids::{
    AllocationId, CondominiumId, PaymentId, PlanId, SubscriptionId, TransferId, UserId,
};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
