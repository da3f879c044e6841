//! Admin transfer handlers.
//!
//! ## Commands
//! - Offering a condominium's admin role to another account
//! - Accepting (graded failure policy) and rejecting an offer
//!
//! ## Queries
//! - Pending offers for the caller

mod accept_admin_transfer;
mod list_pending_transfers;
mod offer_admin_transfer;
mod reject_admin_transfer;

// Commands
pub use accept_admin_transfer::{
    AcceptAdminTransferCommand, AcceptAdminTransferHandler, AcceptAdminTransferResult,
};
pub use offer_admin_transfer::{OfferAdminTransferCommand, OfferAdminTransferHandler};
pub use reject_admin_transfer::{
    RejectAdminTransferCommand, RejectAdminTransferHandler, RejectAdminTransferResult,
};

// Queries
pub use list_pending_transfers::{ListPendingTransfersHandler, ListPendingTransfersQuery};
