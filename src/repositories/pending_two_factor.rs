use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AuthError;
use crate::models::PendingTwoFactor;
use crate::repositories::PendingTwoFactorStore;

#[derive(Debug, Clone)]
pub struct PgPendingTwoFactorStore {
    pool: PgPool,
}

impl PgPendingTwoFactorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PendingTwoFactorStore for PgPendingTwoFactorStore {
    async fn create(&self, pending: &PendingTwoFactor) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO pending_two_factor (id, user_id, created_at, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&pending.id)
        .bind(&pending.user_id)
        .bind(pending.created_at)
        .bind(pending.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, pending_id: &str) -> Result<Option<PendingTwoFactor>, AuthError> {
        let pending = sqlx::query_as::<_, PendingTwoFactor>(
            "SELECT id, user_id, created_at, expires_at FROM pending_two_factor WHERE id = $1",
        )
        .bind(pending_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(pending)
    }

    async fn delete(&self, pending_id: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM pending_two_factor WHERE id = $1")
            .bind(pending_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM pending_two_factor WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
