//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `PlanCatalog` - Read-only plan lookup
//! - `SubscriptionRepository` - Subscription aggregate persistence
//! - `PaymentLedger` - Payment records and atomic settlement
//! - `LicenseRepository` - Atomic allocate, release and transfer
//! - `AdminTransferRepository` - Pending transfers and the acceptance unit of work
//!
//! ## Collaborator Ports
//!
//! - `AdminRoleDirectory` - Condominium owners and admins
//! - `Notifier` - Fire-and-forget user notifications
//! - `EventPublisher` - Domain event publication

mod admin_role_directory;
mod admin_transfer_repository;
mod event_publisher;
mod license_repository;
mod notifier;
mod payment_ledger;
mod plan_catalog;
mod subscription_repository;

pub use admin_role_directory::AdminRoleDirectory;
pub use admin_transfer_repository::AdminTransferRepository;
pub use event_publisher::EventPublisher;
pub use license_repository::LicenseRepository;
pub use notifier::{Notification, NotificationKind, Notifier};
pub use payment_ledger::{PaymentLedger, SettleOutcome, SubscriptionWrite};
pub use plan_catalog::PlanCatalog;
pub use subscription_repository::SubscriptionRepository;
