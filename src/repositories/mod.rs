//! Store contracts for the auth lifecycle, plus their Postgres (sqlx) and
//! in-memory backends.
//!
//! Concurrency correctness lives at this seam: the `mark_*` transitions are
//! conditional updates (compare-and-swap) so concurrent callers racing on
//! the same row converge: exactly one observes the transition, the others
//! see `false` and take the already-transitioned branch.

pub mod memory;
pub mod pending_two_factor;
pub mod recovery_code;
pub mod refresh_token;
pub mod session;
pub mod user;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AuthError;
use crate::models::{AuthRefreshToken, AuthSession, PendingTwoFactor, RecoveryCode, User};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError>;
    async fn update_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> Result<(), AuthError>;
    /// Stores a new encrypted TOTP secret; two-factor stays disabled until
    /// confirmed.
    async fn store_two_factor_secret(
        &self,
        user_id: &str,
        encrypted_secret: &str,
    ) -> Result<(), AuthError>;
    async fn enable_two_factor(&self, user_id: &str) -> Result<(), AuthError>;
    /// Disables two-factor and clears the stored secret.
    async fn disable_two_factor(&self, user_id: &str) -> Result<(), AuthError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: &AuthSession) -> Result<(), AuthError>;
    async fn find_by_id(&self, session_id: &str) -> Result<Option<AuthSession>, AuthError>;
    async fn list_active_for_user(&self, user_id: &str) -> Result<Vec<AuthSession>, AuthError>;
    /// Marks the session revoked. Returns `false` when it was already
    /// revoked, so cascades never double-count.
    async fn revoke(&self, session_id: &str) -> Result<bool, AuthError>;
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn create(&self, token: &AuthRefreshToken) -> Result<(), AuthError>;
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<AuthRefreshToken>, AuthError>;
    async fn find_by_session(&self, session_id: &str)
        -> Result<Vec<AuthRefreshToken>, AuthError>;
    /// Single-use rotation transition. Returns `false` when the token was
    /// already rotated; the caller must then route into the grace-window
    /// logic instead of issuing twice.
    async fn mark_rotated(
        &self,
        token_id: &str,
        rotated_at: DateTime<Utc>,
    ) -> Result<bool, AuthError>;
    /// One-shot grace allowance. Returns `false` when it was already
    /// consumed.
    async fn mark_grace_used(&self, token_id: &str) -> Result<bool, AuthError>;
    /// Returns `false` when the token was already revoked.
    async fn revoke(&self, token_id: &str) -> Result<bool, AuthError>;
    async fn revoke_for_session(&self, session_id: &str) -> Result<u64, AuthError>;
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}

#[async_trait]
pub trait PendingTwoFactorStore: Send + Sync {
    async fn create(&self, pending: &PendingTwoFactor) -> Result<(), AuthError>;
    async fn find_by_id(&self, pending_id: &str) -> Result<Option<PendingTwoFactor>, AuthError>;
    async fn delete(&self, pending_id: &str) -> Result<(), AuthError>;
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}

#[async_trait]
pub trait RecoveryCodeStore: Send + Sync {
    /// Purges the user's existing codes and stores the fresh batch.
    async fn replace_for_user(
        &self,
        user_id: &str,
        codes: &[RecoveryCode],
    ) -> Result<(), AuthError>;
    async fn list_unused_for_user(&self, user_id: &str) -> Result<Vec<RecoveryCode>, AuthError>;
    /// One-way used transition. Returns `false` when already used.
    async fn mark_used(&self, code_id: &str) -> Result<bool, AuthError>;
    async fn delete_for_user(&self, user_id: &str) -> Result<(), AuthError>;
}
