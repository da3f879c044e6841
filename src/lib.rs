//! Condo Billing - subscription lifecycle, license allocation and payment
//! reconciliation for a condominium management platform.
//!
//! Accounts subscribe to plans that grant a number of condominium licenses.
//! Payments arrive as provider callbacks and drive the subscription state
//! machine; admin transfers move a condominium (and optionally its license)
//! between accounts.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
