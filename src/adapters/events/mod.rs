//! Event publisher adapters.
//!
//! - `InMemoryEventBus` - In-process capture for tests
//! - `LoggingEventPublisher` - Structured log output for the service binary

mod in_memory;
mod logging;

pub use in_memory::InMemoryEventBus;
pub use logging::LoggingEventPublisher;
