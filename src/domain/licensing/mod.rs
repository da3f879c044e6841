//! Licensing domain module.
//!
//! Tracks which condominiums consume the capacity of which subscription.

mod allocation;

pub use allocation::{AllocateOutcome, LicenseAllocation, LicenseTransfer, TransferOutcome};
