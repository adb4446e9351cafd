use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AuthError;
use crate::models::User;
use crate::repositories::UserStore;

#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, email, password_hash, roles, two_factor_enabled, two_factor_secret";

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn store_two_factor_secret(
        &self,
        user_id: &str,
        encrypted_secret: &str,
    ) -> Result<(), AuthError> {
        sqlx::query(
            "UPDATE users SET two_factor_secret = $1, two_factor_enabled = FALSE, \
             updated_at = NOW() WHERE id = $2",
        )
        .bind(encrypted_secret)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn enable_two_factor(&self, user_id: &str) -> Result<(), AuthError> {
        sqlx::query(
            "UPDATE users SET two_factor_enabled = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn disable_two_factor(&self, user_id: &str) -> Result<(), AuthError> {
        sqlx::query(
            "UPDATE users SET two_factor_enabled = FALSE, two_factor_secret = NULL, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
