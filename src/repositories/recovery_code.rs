use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AuthError;
use crate::models::RecoveryCode;
use crate::repositories::RecoveryCodeStore;

#[derive(Debug, Clone)]
pub struct PgRecoveryCodeStore {
    pool: PgPool,
}

impl PgRecoveryCodeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecoveryCodeStore for PgRecoveryCodeStore {
    async fn replace_for_user(
        &self,
        user_id: &str,
        codes: &[RecoveryCode],
    ) -> Result<(), AuthError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM recovery_codes WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for code in codes {
            sqlx::query(
                "INSERT INTO recovery_codes (id, user_id, code_hash, used) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(&code.id)
            .bind(&code.user_id)
            .bind(&code.code_hash)
            .bind(code.used)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_unused_for_user(&self, user_id: &str) -> Result<Vec<RecoveryCode>, AuthError> {
        let codes = sqlx::query_as::<_, RecoveryCode>(
            "SELECT id, user_id, code_hash, used FROM recovery_codes \
             WHERE user_id = $1 AND used = FALSE ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }

    async fn mark_used(&self, code_id: &str) -> Result<bool, AuthError> {
        // One-way transition; a used code can never flip back.
        let result =
            sqlx::query("UPDATE recovery_codes SET used = TRUE WHERE id = $1 AND used = FALSE")
                .bind(code_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_user(&self, user_id: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM recovery_codes WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
