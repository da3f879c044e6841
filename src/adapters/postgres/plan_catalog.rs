//! PostgreSQL implementation of PlanCatalog.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::domain::billing::{BillingInterval, LicensePricingTier, Plan};
use crate::domain::foundation::{DomainError, PlanId};
use crate::ports::PlanCatalog;

use super::{corrupt, count_from_db, database_error};

pub struct PostgresPlanCatalog {
    pool: PgPool,
}

impl PostgresPlanCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: i64,
    slug: String,
    price_cents: i64,
    currency: String,
    billing_interval: String,
    included_licenses: i32,
    feature_flags: Vec<String>,
    license_pricing_tiers: Json<Vec<LicensePricingTier>>,
    active: bool,
}

impl TryFrom<PlanRow> for Plan {
    type Error = DomainError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        Ok(Plan {
            id: PlanId::from_db(row.id),
            slug: row.slug,
            price_cents: row.price_cents,
            currency: row.currency,
            billing_interval: BillingInterval::parse(&row.billing_interval)
                .ok_or_else(|| corrupt("billing_interval", &row.billing_interval))?,
            included_licenses: count_from_db(
                "included_licenses",
                i64::from(row.included_licenses),
            )?,
            feature_flags: row.feature_flags,
            license_pricing_tiers: row.license_pricing_tiers.0,
            active: row.active,
        })
    }
}

#[async_trait]
impl PlanCatalog for PostgresPlanCatalog {
    async fn find_by_id(&self, id: &PlanId) -> Result<Option<Plan>, DomainError> {
        let row: Option<PlanRow> = sqlx::query_as(
            r#"
            SELECT id, slug, price_cents, currency, billing_interval, included_licenses,
                   feature_flags, license_pricing_tiers, active
            FROM billing_plans
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("fetch plan", e))?;

        row.map(Plan::try_from).transpose()
    }
}
