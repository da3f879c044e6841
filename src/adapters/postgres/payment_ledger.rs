//! PostgreSQL implementation of PaymentLedger.
//!
//! Settlement runs in one transaction: the payment row is locked, the
//! subscription is written only if its `updated_at` still matches, and the
//! payment leaves `pending` last.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentId, SubscriptionId, Timestamp,
};
use crate::domain::payment::{Payment, PaymentLookup, PaymentMethod, PaymentStatus};
use crate::ports::{PaymentLedger, SettleOutcome, SubscriptionWrite};

use super::{corrupt, count_to_db, database_error};

pub struct PostgresPaymentLedger {
    pool: PgPool,
}

impl PostgresPaymentLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    subscription_id: Uuid,
    external_payment_id: Option<String>,
    request_id: Option<String>,
    order_id: Option<String>,
    amount_cents: i64,
    currency: String,
    status: String,
    method: Option<String>,
    raw_callback_payload: Option<JsonValue>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status = PaymentStatus::parse(&row.status)
            .ok_or_else(|| corrupt("payment status", &row.status))?;
        let method = match row.method {
            Some(m) => Some(PaymentMethod::parse(&m).ok_or_else(|| corrupt("payment method", &m))?),
            None => None,
        };

        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            subscription_id: SubscriptionId::from_uuid(row.subscription_id),
            external_payment_id: row.external_payment_id,
            request_id: row.request_id,
            order_id: row.order_id,
            amount_cents: row.amount_cents,
            currency: row.currency,
            status,
            method,
            raw_callback_payload: row.raw_callback_payload,
            failure_reason: row.failure_reason,
            created_at: Timestamp::from_datetime(row.created_at),
            confirmed_at: row.confirmed_at.map(Timestamp::from_datetime),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

const SELECT_PAYMENT: &str = r#"
    SELECT id, subscription_id, external_payment_id, request_id, order_id, amount_cents,
           currency, status, method, raw_callback_payload, failure_reason,
           created_at, confirmed_at, updated_at
    FROM payments
"#;

#[async_trait]
impl PaymentLedger for PostgresPaymentLedger {
    async fn create(&self, payment: &Payment) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, subscription_id, external_payment_id, request_id, order_id,
                amount_cents, currency, status, method, raw_callback_payload,
                failure_reason, created_at, confirmed_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.subscription_id.as_uuid())
        .bind(&payment.external_payment_id)
        .bind(&payment.request_id)
        .bind(&payment.order_id)
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(payment.method.map(|m| m.as_str()))
        .bind(&payment.raw_callback_payload)
        .bind(&payment.failure_reason)
        .bind(payment.created_at.as_datetime())
        .bind(payment.confirmed_at.as_ref().map(|t| *t.as_datetime()))
        .bind(payment.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| database_error("insert payment", e))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_PAYMENT))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database_error("fetch payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_by(&self, key: &PaymentLookup<'_>) -> Result<Option<Payment>, DomainError> {
        let (column, value) = match key {
            PaymentLookup::RequestId(v) => ("request_id", *v),
            PaymentLookup::OrderId(v) => ("order_id", *v),
            PaymentLookup::ExternalPaymentId(v) => ("external_payment_id", *v),
        };

        // Oldest first when a reference was reused.
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "{} WHERE {} = $1 ORDER BY created_at ASC LIMIT 1",
            SELECT_PAYMENT, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("look up payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn settle(
        &self,
        payment: &Payment,
        subscription: Option<SubscriptionWrite<'_>>,
    ) -> Result<SettleOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| database_error("begin settlement", e))?;

        let stored: Option<(String,)> =
            sqlx::query_as("SELECT status FROM payments WHERE id = $1 FOR UPDATE")
                .bind(payment.id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| database_error("lock payment", e))?;

        let stored_status = match stored {
            Some((status,)) => {
                PaymentStatus::parse(&status).ok_or_else(|| corrupt("payment status", &status))?
            }
            None => {
                return Err(DomainError::new(
                    ErrorCode::PaymentNotFound,
                    format!("Payment {} not found", payment.id),
                ))
            }
        };
        if stored_status != PaymentStatus::Pending {
            // Dropping the transaction rolls it back.
            return Ok(SettleOutcome::AlreadySettled(stored_status));
        }

        if let Some(write) = subscription {
            let sub = write.subscription;
            let result = sqlx::query(
                r#"
                UPDATE subscriptions SET
                    status = $3,
                    current_period_start = $4,
                    current_period_end = $5,
                    trial_ends_at = $6,
                    canceled_at = $7,
                    license_count = $8,
                    updated_at = $9
                WHERE id = $1 AND updated_at = $2
                "#,
            )
            .bind(sub.id.as_uuid())
            .bind(write.expected_updated_at.as_datetime())
            .bind(sub.status.as_str())
            .bind(sub.current_period_start.as_datetime())
            .bind(sub.current_period_end.as_datetime())
            .bind(sub.trial_ends_at.as_ref().map(|t| *t.as_datetime()))
            .bind(sub.canceled_at.as_ref().map(|t| *t.as_datetime()))
            .bind(count_to_db("license_count", sub.license_count)?)
            .bind(sub.updated_at.as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(|e| database_error("update subscription during settlement", e))?;

            if result.rows_affected() == 0 {
                return Ok(SettleOutcome::SubscriptionChanged);
            }
        }

        sqlx::query(
            r#"
            UPDATE payments SET
                status = $2,
                method = $3,
                raw_callback_payload = $4,
                failure_reason = $5,
                confirmed_at = $6,
                updated_at = $7
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.status.as_str())
        .bind(payment.method.map(|m| m.as_str()))
        .bind(&payment.raw_callback_payload)
        .bind(&payment.failure_reason)
        .bind(payment.confirmed_at.as_ref().map(|t| *t.as_datetime()))
        .bind(payment.updated_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| database_error("settle payment", e))?;

        tx.commit()
            .await
            .map_err(|e| database_error("commit settlement", e))?;

        Ok(SettleOutcome::Applied)
    }
}
