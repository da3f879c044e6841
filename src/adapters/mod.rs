//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `postgres` - Persistence for every repository port
//! - `memory` - Single in-process store for tests and local runs
//! - `http` - axum routes
//! - `events` - Event publishers (logging, in-memory)
//! - `notifications` - Notifiers (logging, in-memory)

pub mod events;
pub mod http;
pub mod memory;
pub mod notifications;
pub mod postgres;

pub use events::{InMemoryEventBus, LoggingEventPublisher};
pub use memory::InMemoryBillingStore;
pub use notifications::{InMemoryNotifier, LoggingNotifier};
