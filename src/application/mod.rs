//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Primary steps return `Result`; secondary steps go through
//! [`best_effort::attempt`].

pub mod best_effort;
pub mod handlers;

pub use best_effort::StepOutcome;
