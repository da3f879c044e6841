//! Admin transfer domain module.

mod events;
pub(crate) mod pending;

pub use events::AdminTransferDecided;
pub use pending::{AdminTransferPending, NewAdminTransfer, TransferStatus};
