//! Plan catalog port (read-only).

use async_trait::async_trait;

use crate::domain::billing::Plan;
use crate::domain::foundation::{DomainError, PlanId};

/// Read access to published billing plans.
#[async_trait]
pub trait PlanCatalog: Send + Sync {
    /// Find a plan by id, active or not.
    ///
    /// Returns `None` if the plan does not exist.
    async fn find_by_id(&self, id: &PlanId) -> Result<Option<Plan>, DomainError>;
}
