//! PostgreSQL implementation of AdminTransferRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    CondominiumId, DomainError, ErrorCode, SubscriptionId, Timestamp, TransferId, UserId,
};
use crate::domain::transfer::{AdminTransferPending, NewAdminTransfer, TransferStatus};
use crate::ports::AdminTransferRepository;

use super::{corrupt, database_error};

pub struct PostgresAdminTransferRepository {
    pool: PgPool,
}

impl PostgresAdminTransferRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Distinguishes a lost compare-and-swap from a missing row.
    async fn undecided_error(&self, transfer: &AdminTransferPending) -> DomainError {
        match self.find_by_id(&transfer.id).await {
            Ok(Some(_)) => DomainError::new(
                ErrorCode::AlreadyProcessed,
                "This transfer has already been processed",
            )
            .with_detail("transfer_id", transfer.id.to_string()),
            Ok(None) => DomainError::new(
                ErrorCode::TransferNotFound,
                format!("Transfer {} not found", transfer.id),
            ),
            Err(e) => e,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransferRow {
    id: i64,
    condominium_id: i64,
    user_id: i64,
    assigned_by_user_id: i64,
    status: String,
    is_professional_transfer: bool,
    from_subscription_id: Option<Uuid>,
    to_subscription_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
}

impl TryFrom<TransferRow> for AdminTransferPending {
    type Error = DomainError;

    fn try_from(row: TransferRow) -> Result<Self, Self::Error> {
        Ok(AdminTransferPending {
            id: TransferId::from_db(row.id),
            condominium_id: CondominiumId::from_db(row.condominium_id),
            user_id: UserId::from_db(row.user_id),
            assigned_by_user_id: UserId::from_db(row.assigned_by_user_id),
            status: TransferStatus::parse(&row.status)
                .ok_or_else(|| corrupt("transfer status", &row.status))?,
            is_professional_transfer: row.is_professional_transfer,
            from_subscription_id: row.from_subscription_id.map(SubscriptionId::from_uuid),
            to_subscription_id: row.to_subscription_id.map(SubscriptionId::from_uuid),
            created_at: Timestamp::from_datetime(row.created_at),
            decided_at: row.decided_at.map(Timestamp::from_datetime),
        })
    }
}

const TRANSFER_COLUMNS: &str = r#"
    id, condominium_id, user_id, assigned_by_user_id, status, is_professional_transfer,
    from_subscription_id, to_subscription_id, created_at, decided_at
"#;

#[async_trait]
impl AdminTransferRepository for PostgresAdminTransferRepository {
    async fn create(
        &self,
        transfer: &NewAdminTransfer,
    ) -> Result<AdminTransferPending, DomainError> {
        let row: TransferRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO admin_transfers_pending (
                condominium_id, user_id, assigned_by_user_id, status,
                is_professional_transfer, from_subscription_id, to_subscription_id, created_at
            ) VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7)
            RETURNING {}
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(transfer.condominium_id.as_i64())
        .bind(transfer.user_id.as_i64())
        .bind(transfer.assigned_by_user_id.as_i64())
        .bind(transfer.is_professional_transfer)
        .bind(transfer.from_subscription_id.map(|s| *s.as_uuid()))
        .bind(transfer.to_subscription_id.map(|s| *s.as_uuid()))
        .bind(*Timestamp::now().as_datetime())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database_error("insert admin transfer", e))?;

        AdminTransferPending::try_from(row)
    }

    async fn find_by_id(
        &self,
        id: &TransferId,
    ) -> Result<Option<AdminTransferPending>, DomainError> {
        let row: Option<TransferRow> = sqlx::query_as(&format!(
            "SELECT {} FROM admin_transfers_pending WHERE id = $1",
            TRANSFER_COLUMNS
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database_error("fetch admin transfer", e))?;

        row.map(AdminTransferPending::try_from).transpose()
    }

    async fn list_pending_for(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AdminTransferPending>, DomainError> {
        let rows: Vec<TransferRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM admin_transfers_pending
            WHERE user_id = $1 AND status = 'pending'
            ORDER BY created_at ASC, id ASC
            "#,
            TRANSFER_COLUMNS
        ))
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database_error("list pending transfers", e))?;

        rows.into_iter()
            .map(AdminTransferPending::try_from)
            .collect()
    }

    async fn commit_acceptance(&self, transfer: &AdminTransferPending) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| database_error("begin transfer acceptance", e))?;

        let result = sqlx::query(
            r#"
            UPDATE admin_transfers_pending SET status = $2, decided_at = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(transfer.id.as_i64())
        .bind(transfer.status.as_str())
        .bind(transfer.decided_at.as_ref().map(|t| *t.as_datetime()))
        .execute(&mut *tx)
        .await
        .map_err(|e| database_error("mark transfer accepted", e))?;

        if result.rows_affected() == 0 {
            drop(tx);
            return Err(self.undecided_error(transfer).await);
        }

        sqlx::query(
            r#"
            INSERT INTO condominium_admins (user_id, condominium_id, granted_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, condominium_id) DO NOTHING
            "#,
        )
        .bind(transfer.user_id.as_i64())
        .bind(transfer.condominium_id.as_i64())
        .bind(*transfer.decided_at.unwrap_or_else(Timestamp::now).as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| database_error("grant admin role", e))?;

        tx.commit()
            .await
            .map_err(|e| database_error("commit transfer acceptance", e))?;

        Ok(())
    }

    async fn commit_rejection(&self, transfer: &AdminTransferPending) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE admin_transfers_pending SET status = $2, decided_at = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(transfer.id.as_i64())
        .bind(transfer.status.as_str())
        .bind(transfer.decided_at.as_ref().map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| database_error("mark transfer rejected", e))?;

        if result.rows_affected() == 0 {
            return Err(self.undecided_error(transfer).await);
        }

        Ok(())
    }
}
