use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AuthError;
use crate::models::AuthSession;
use crate::repositories::SessionStore;

#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SESSION_COLUMNS: &str =
    "id, user_id, ip_address, user_agent, issued_at, expires_at, remember_me, revoked";

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: &AuthSession) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO auth_sessions \
             (id, user_id, ip_address, user_agent, issued_at, expires_at, remember_me, revoked) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.issued_at)
        .bind(session.expires_at)
        .bind(session.remember_me)
        .bind(session.revoked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, session_id: &str) -> Result<Option<AuthSession>, AuthError> {
        let session = sqlx::query_as::<_, AuthSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM auth_sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn list_active_for_user(&self, user_id: &str) -> Result<Vec<AuthSession>, AuthError> {
        let sessions = sqlx::query_as::<_, AuthSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM auth_sessions \
             WHERE user_id = $1 AND revoked = FALSE ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    async fn revoke(&self, session_id: &str) -> Result<bool, AuthError> {
        // Conditional update: already-revoked rows report zero rows affected.
        let result = sqlx::query(
            "UPDATE auth_sessions SET revoked = TRUE WHERE id = $1 AND revoked = FALSE",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
