//! PostgreSQL implementation of SubscriptionRepository.
//!
//! The partial unique index `subscriptions_one_live_per_user` is what keeps
//! two concurrent trial starts from both landing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{PlanSnapshot, Subscription, SubscriptionStatus};
use crate::domain::foundation::{
    DomainError, ErrorCode, SubscriptionId, Timestamp, UserId,
};
use crate::ports::SubscriptionRepository;

use super::{corrupt, count_from_db, count_to_db, database_error, violates};

const ONE_LIVE_PER_USER: &str = "subscriptions_one_live_per_user";

pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: i64,
    plan_snapshot: Json<PlanSnapshot>,
    status: String,
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
    trial_ends_at: Option<DateTime<Utc>>,
    canceled_at: Option<DateTime<Utc>>,
    license_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let status = SubscriptionStatus::parse(&row.status)
            .ok_or_else(|| corrupt("subscription status", &row.status))?;

        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            user_id: UserId::from_db(row.user_id),
            plan: row.plan_snapshot.0,
            status,
            current_period_start: Timestamp::from_datetime(row.current_period_start),
            current_period_end: Timestamp::from_datetime(row.current_period_end),
            trial_ends_at: row.trial_ends_at.map(Timestamp::from_datetime),
            canceled_at: row.canceled_at.map(Timestamp::from_datetime),
            license_count: count_from_db("license_count", i64::from(row.license_count))?,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

const SELECT_SUBSCRIPTION: &str = r#"
    SELECT id, user_id, plan_snapshot, status, current_period_start, current_period_end,
           trial_ends_at, canceled_at, license_count, created_at, updated_at
    FROM subscriptions
"#;

fn live_subscription_exists() -> DomainError {
    DomainError::new(
        ErrorCode::SubscriptionExists,
        "User already has an active subscription",
    )
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, user_id, plan_id, plan_snapshot, status,
                current_period_start, current_period_end, trial_ends_at, canceled_at,
                license_count, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.user_id.as_i64())
        .bind(subscription.plan.plan_id.as_i64())
        .bind(Json(&subscription.plan))
        .bind(subscription.status.as_str())
        .bind(subscription.current_period_start.as_datetime())
        .bind(subscription.current_period_end.as_datetime())
        .bind(subscription.trial_ends_at.as_ref().map(|t| *t.as_datetime()))
        .bind(subscription.canceled_at.as_ref().map(|t| *t.as_datetime()))
        .bind(count_to_db("license_count", subscription.license_count)?)
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if violates(&e, ONE_LIVE_PER_USER) {
                live_subscription_exists()
            } else {
                database_error("insert subscription", e)
            }
        })?;

        Ok(())
    }

    async fn update(
        &self,
        subscription: &Subscription,
        expected_updated_at: Timestamp,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                plan_id = $2,
                plan_snapshot = $3,
                status = $4,
                current_period_start = $5,
                current_period_end = $6,
                trial_ends_at = $7,
                canceled_at = $8,
                license_count = $9,
                updated_at = $10
            WHERE id = $1 AND updated_at = $11
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.plan.plan_id.as_i64())
        .bind(Json(&subscription.plan))
        .bind(subscription.status.as_str())
        .bind(subscription.current_period_start.as_datetime())
        .bind(subscription.current_period_end.as_datetime())
        .bind(subscription.trial_ends_at.as_ref().map(|t| *t.as_datetime()))
        .bind(subscription.canceled_at.as_ref().map(|t| *t.as_datetime()))
        .bind(count_to_db("license_count", subscription.license_count)?)
        .bind(subscription.updated_at.as_datetime())
        .bind(expected_updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if violates(&e, ONE_LIVE_PER_USER) {
                live_subscription_exists()
            } else {
                database_error("update subscription", e)
            }
        })?;

        if result.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM subscriptions WHERE id = $1)")
                    .bind(subscription.id.as_uuid())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| database_error("check subscription", e))?;
            let (code, message) = if exists {
                (
                    ErrorCode::ConcurrentModification,
                    format!("Subscription {} was modified concurrently", subscription.id),
                )
            } else {
                (
                    ErrorCode::SubscriptionNotFound,
                    format!("Subscription {} not found", subscription.id),
                )
            };
            return Err(DomainError::new(code, message));
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> =
            sqlx::query_as(&format!("{} WHERE id = $1", SELECT_SUBSCRIPTION))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| database_error("fetch subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_live_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "{} WHERE user_id = $1 AND status <> 'canceled'",
            SELECT_SUBSCRIPTION
        ))
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("fetch live subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }
}
