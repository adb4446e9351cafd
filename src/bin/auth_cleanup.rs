use chrono::Utc;

use authkeeper::config::Config;
use authkeeper::db::create_pool;
use authkeeper::repositories::pending_two_factor::PgPendingTwoFactorStore;
use authkeeper::repositories::refresh_token::PgRefreshTokenStore;
use authkeeper::repositories::session::PgSessionStore;
use authkeeper::repositories::{PendingTwoFactorStore, RefreshTokenStore, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    let pool = create_pool(&config.database_url).await?;
    let now = Utc::now();

    let deleted_tokens = PgRefreshTokenStore::new(pool.clone())
        .delete_expired(now)
        .await?;
    if deleted_tokens > 0 {
        tracing::info!("Deleted {} expired refresh tokens", deleted_tokens);
    }

    let deleted_sessions = PgSessionStore::new(pool.clone())
        .delete_expired(now)
        .await?;
    if deleted_sessions > 0 {
        tracing::info!("Deleted {} expired sessions", deleted_sessions);
    }

    let deleted_pending = PgPendingTwoFactorStore::new(pool.clone())
        .delete_expired(now)
        .await?;
    if deleted_pending > 0 {
        tracing::info!("Deleted {} expired two-factor challenges", deleted_pending);
    }

    sqlx::query("VACUUM (ANALYZE) auth_refresh_tokens")
        .execute(&pool)
        .await?;
    sqlx::query("VACUUM (ANALYZE) auth_sessions")
        .execute(&pool)
        .await?;

    Ok(())
}
