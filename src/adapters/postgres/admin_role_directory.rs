//! PostgreSQL implementation of AdminRoleDirectory.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{CondominiumId, DomainError, UserId};
use crate::ports::AdminRoleDirectory;

use super::database_error;

pub struct PostgresAdminRoleDirectory {
    pool: PgPool,
}

impl PostgresAdminRoleDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminRoleDirectory for PostgresAdminRoleDirectory {
    async fn owner_of(
        &self,
        condominium_id: &CondominiumId,
    ) -> Result<Option<UserId>, DomainError> {
        let owner: Option<(i64,)> =
            sqlx::query_as("SELECT owner_user_id FROM condominiums WHERE id = $1")
                .bind(condominium_id.as_i64())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| database_error("fetch condominium owner", e))?;

        Ok(owner.map(|(id,)| UserId::from_db(id)))
    }

    async fn is_admin(
        &self,
        user_id: &UserId,
        condominium_id: &CondominiumId,
    ) -> Result<bool, DomainError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM condominium_admins
                WHERE user_id = $1 AND condominium_id = $2
            )
            "#,
        )
        .bind(user_id.as_i64())
        .bind(condominium_id.as_i64())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database_error("check admin role", e))?;

        Ok(exists)
    }

    async fn revoke_admin(
        &self,
        user_id: &UserId,
        condominium_id: &CondominiumId,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "DELETE FROM condominium_admins WHERE user_id = $1 AND condominium_id = $2",
        )
        .bind(user_id.as_i64())
        .bind(condominium_id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| database_error("revoke admin role", e))?;

        Ok(result.rows_affected() > 0)
    }
}
