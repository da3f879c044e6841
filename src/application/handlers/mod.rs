//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod licensing;
pub mod payment;
pub mod subscription;
pub mod transfer;

#[cfg(test)]
pub(crate) mod test_support;
