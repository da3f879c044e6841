//! PostgreSQL implementation of LicenseRepository.
//!
//! `allocate` and `transfer` lock the capacity-holding subscription row with
//! `FOR UPDATE` before counting, so concurrent requests against the same
//! subscription serialize. Subscriptions are always locked before
//! allocations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::foundation::{
    AllocationId, CondominiumId, DomainError, ErrorCode, SubscriptionId, Timestamp, UserId,
};
use crate::domain::licensing::{
    AllocateOutcome, LicenseAllocation, LicenseTransfer, TransferOutcome,
};
use crate::ports::LicenseRepository;

use super::{count_from_db, database_error, violates};

const ONE_ACTIVE_PER_CONDOMINIUM: &str = "license_allocations_one_active_per_condominium";

pub struct PostgresLicenseRepository {
    pool: PgPool,
}

impl PostgresLicenseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AllocationRow {
    id: Uuid,
    subscription_id: Uuid,
    condominium_id: i64,
    assigned_by_user_id: Option<i64>,
    is_professional_transfer: bool,
    assigned_at: DateTime<Utc>,
    released_at: Option<DateTime<Utc>>,
}

impl From<AllocationRow> for LicenseAllocation {
    fn from(row: AllocationRow) -> Self {
        LicenseAllocation {
            id: AllocationId::from_uuid(row.id),
            subscription_id: SubscriptionId::from_uuid(row.subscription_id),
            condominium_id: CondominiumId::from_db(row.condominium_id),
            assigned_by_user_id: row.assigned_by_user_id.map(UserId::from_db),
            is_professional_transfer: row.is_professional_transfer,
            assigned_at: Timestamp::from_datetime(row.assigned_at),
            released_at: row.released_at.map(Timestamp::from_datetime),
        }
    }
}

/// Locked view of a subscription's capacity.
struct Capacity {
    live: bool,
    license_count: u32,
}

async fn lock_capacity(
    tx: &mut Transaction<'_, Postgres>,
    subscription_id: &SubscriptionId,
) -> Result<Option<Capacity>, DomainError> {
    let row: Option<(String, i32)> = sqlx::query_as(
        "SELECT status, license_count FROM subscriptions WHERE id = $1 FOR UPDATE",
    )
    .bind(subscription_id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| database_error("lock subscription", e))?;

    row.map(|(status, license_count)| {
        Ok(Capacity {
            live: status != "canceled",
            license_count: count_from_db("license_count", i64::from(license_count))?,
        })
    })
    .transpose()
}

async fn count_active_in(
    tx: &mut Transaction<'_, Postgres>,
    subscription_id: &SubscriptionId,
) -> Result<u32, DomainError> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM license_allocations WHERE subscription_id = $1 AND released_at IS NULL",
    )
    .bind(subscription_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| database_error("count allocations", e))?;

    count_from_db("active allocations", count)
}

async fn insert_allocation(
    tx: &mut Transaction<'_, Postgres>,
    allocation: &LicenseAllocation,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO license_allocations (
            id, subscription_id, condominium_id, assigned_by_user_id,
            is_professional_transfer, assigned_at, released_at
        ) VALUES ($1, $2, $3, $4, $5, $6, NULL)
        "#,
    )
    .bind(allocation.id.as_uuid())
    .bind(allocation.subscription_id.as_uuid())
    .bind(allocation.condominium_id.as_i64())
    .bind(allocation.assigned_by_user_id.map(|u| u.as_i64()))
    .bind(allocation.is_professional_transfer)
    .bind(allocation.assigned_at.as_datetime())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

const SELECT_ALLOCATION: &str = r#"
    SELECT id, subscription_id, condominium_id, assigned_by_user_id,
           is_professional_transfer, assigned_at, released_at
    FROM license_allocations
"#;

#[async_trait]
impl LicenseRepository for PostgresLicenseRepository {
    async fn count_active(&self, subscription_id: &SubscriptionId) -> Result<u32, DomainError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM license_allocations WHERE subscription_id = $1 AND released_at IS NULL",
        )
        .bind(subscription_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database_error("count allocations", e))?;

        count_from_db("active allocations", count)
    }

    async fn find_active_for_condominium(
        &self,
        condominium_id: &CondominiumId,
    ) -> Result<Option<LicenseAllocation>, DomainError> {
        let row: Option<AllocationRow> = sqlx::query_as(&format!(
            "{} WHERE condominium_id = $1 AND released_at IS NULL",
            SELECT_ALLOCATION
        ))
        .bind(condominium_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("fetch allocation", e))?;

        Ok(row.map(LicenseAllocation::from))
    }

    async fn allocate(
        &self,
        subscription_id: &SubscriptionId,
        condominium_id: &CondominiumId,
        assigned_by: Option<UserId>,
        now: Timestamp,
    ) -> Result<AllocateOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| database_error("begin allocation", e))?;

        let capacity = match lock_capacity(&mut tx, subscription_id).await? {
            Some(c) if c.live => c,
            Some(_) => {
                return Err(DomainError::new(
                    ErrorCode::InvalidStateTransition,
                    "Subscription is canceled",
                ))
            }
            None => {
                return Err(DomainError::new(
                    ErrorCode::SubscriptionNotFound,
                    format!("Subscription {} not found", subscription_id),
                ))
            }
        };

        let taken: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM license_allocations WHERE condominium_id = $1 AND released_at IS NULL",
        )
        .bind(condominium_id.as_i64())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| database_error("check condominium allocation", e))?;
        if taken.is_some() {
            return Ok(AllocateOutcome::AlreadyAllocated);
        }

        let active = count_active_in(&mut tx, subscription_id).await?;
        if active >= capacity.license_count {
            return Ok(AllocateOutcome::CapacityExceeded {
                active,
                license_count: capacity.license_count,
            });
        }

        let allocation =
            LicenseAllocation::assign(*subscription_id, *condominium_id, assigned_by, false, now);
        match insert_allocation(&mut tx, &allocation).await {
            Ok(()) => {}
            // Another subscription's allocate for the same condominium won the race.
            Err(e) if violates(&e, ONE_ACTIVE_PER_CONDOMINIUM) => {
                return Ok(AllocateOutcome::AlreadyAllocated)
            }
            Err(e) => return Err(database_error("insert allocation", e)),
        }

        tx.commit()
            .await
            .map_err(|e| database_error("commit allocation", e))?;

        Ok(AllocateOutcome::Allocated(allocation))
    }

    async fn release(
        &self,
        condominium_id: &CondominiumId,
        now: Timestamp,
    ) -> Result<Option<LicenseAllocation>, DomainError> {
        let row: Option<AllocationRow> = sqlx::query_as(
            r#"
            UPDATE license_allocations SET released_at = $2
            WHERE condominium_id = $1 AND released_at IS NULL
            RETURNING id, subscription_id, condominium_id, assigned_by_user_id,
                      is_professional_transfer, assigned_at, released_at
            "#,
        )
        .bind(condominium_id.as_i64())
        .bind(now.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("release allocation", e))?;

        Ok(row.map(LicenseAllocation::from))
    }

    async fn transfer(
        &self,
        transfer: &LicenseTransfer,
        now: Timestamp,
    ) -> Result<TransferOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| database_error("begin license transfer", e))?;

        let capacity = lock_capacity(&mut tx, &transfer.to_subscription_id).await?;

        let source: Option<AllocationRow> = sqlx::query_as(&format!(
            "{} WHERE condominium_id = $1 AND released_at IS NULL FOR UPDATE",
            SELECT_ALLOCATION
        ))
        .bind(transfer.condominium_id.as_i64())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| database_error("lock source allocation", e))?;

        let source = match source {
            Some(row) if row.subscription_id == *transfer.from_subscription_id.as_uuid() => {
                LicenseAllocation::from(row)
            }
            _ => return Ok(TransferOutcome::SourceNotHolding),
        };

        let capacity = match capacity {
            Some(c) if c.live => c,
            _ => return Ok(TransferOutcome::DestinationInactive),
        };
        let active = count_active_in(&mut tx, &transfer.to_subscription_id).await?;
        if active >= capacity.license_count {
            return Ok(TransferOutcome::CapacityExceeded {
                active,
                license_count: capacity.license_count,
            });
        }

        sqlx::query("UPDATE license_allocations SET released_at = $2 WHERE id = $1")
            .bind(source.id.as_uuid())
            .bind(now.as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(|e| database_error("release source allocation", e))?;

        let created = LicenseAllocation::assign(
            transfer.to_subscription_id,
            transfer.condominium_id,
            Some(transfer.acting_user_id),
            transfer.is_professional_transfer,
            now,
        );
        insert_allocation(&mut tx, &created)
            .await
            .map_err(|e| database_error("insert transferred allocation", e))?;

        tx.commit()
            .await
            .map_err(|e| database_error("commit license transfer", e))?;

        Ok(TransferOutcome::Transferred {
            released: source.id,
            created: created.id,
        })
    }
}
