use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AuthError;
use crate::models::AuthRefreshToken;
use crate::repositories::RefreshTokenStore;

#[derive(Debug, Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TOKEN_COLUMNS: &str = "id, session_id, token_hash, issued_at, expires_at, revoked, \
                             rotated, rotated_at, grace_used";

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn create(&self, token: &AuthRefreshToken) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO auth_refresh_tokens \
             (id, session_id, token_hash, issued_at, expires_at, revoked, rotated, rotated_at, grace_used) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&token.id)
        .bind(&token.session_id)
        .bind(&token.token_hash)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.revoked)
        .bind(token.rotated)
        .bind(token.rotated_at)
        .bind(token.grace_used)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<AuthRefreshToken>, AuthError> {
        let token = sqlx::query_as::<_, AuthRefreshToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM auth_refresh_tokens WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    async fn find_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<AuthRefreshToken>, AuthError> {
        let tokens = sqlx::query_as::<_, AuthRefreshToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM auth_refresh_tokens WHERE session_id = $1 ORDER BY id"
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tokens)
    }

    async fn mark_rotated(
        &self,
        token_id: &str,
        rotated_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        // Compare-and-swap: under concurrent duplicate refreshes exactly one
        // caller wins this UPDATE; the loser sees zero rows affected and
        // must take the grace-window branch.
        let result = sqlx::query(
            "UPDATE auth_refresh_tokens SET rotated = TRUE, rotated_at = $2 \
             WHERE id = $1 AND rotated = FALSE",
        )
        .bind(token_id)
        .bind(rotated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_grace_used(&self, token_id: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE auth_refresh_tokens SET grace_used = TRUE \
             WHERE id = $1 AND grace_used = FALSE",
        )
        .bind(token_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke(&self, token_id: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE auth_refresh_tokens SET revoked = TRUE WHERE id = $1 AND revoked = FALSE",
        )
        .bind(token_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_for_session(&self, session_id: &str) -> Result<u64, AuthError> {
        let result = sqlx::query(
            "UPDATE auth_refresh_tokens SET revoked = TRUE \
             WHERE session_id = $1 AND revoked = FALSE",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM auth_refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
