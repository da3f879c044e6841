//! License allocator handlers.
//!
//! ## Commands
//! - Allocating and releasing a condominium's license
//! - Transferring a license between subscriptions
//!
//! ## Queries
//! - Whether the user may create another condominium

mod allocate_license;
mod can_create_condominium;
mod release_license;
mod transfer_licenses;

// Commands
pub use allocate_license::{AllocateLicenseCommand, AllocateLicenseHandler};
pub use release_license::{ReleaseLicenseCommand, ReleaseLicenseHandler};
pub use transfer_licenses::{
    TransferLicensesCommand, TransferLicensesHandler, TransferLicensesResult,
};

// Queries
pub use can_create_condominium::{
    CanCreateCondominiumHandler, CanCreateCondominiumQuery, CanCreateCondominiumResult,
};
