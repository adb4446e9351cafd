//! User account model, referenced by the session and token lifecycles.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Database representation of a user account. The engine only reads
/// credentials and two-factor state from it; everything else belongs to
/// the user aggregate.
pub struct User {
    /// Unique identifier for the user.
    pub id: String,
    /// Normalized (trimmed, lowercased) email used for sign-in.
    pub email: String,
    /// Argon2 hash of the user's password.
    pub password_hash: String,
    /// Role names carried into access-token claims.
    pub roles: Vec<String>,
    /// Whether the user has completed two-factor enrollment.
    pub two_factor_enabled: bool,
    /// Encrypted TOTP shared secret, present once setup has started.
    pub two_factor_secret: Option<String>,
}

impl User {
    /// Returns `true` when setup has been started but not yet confirmed.
    pub fn has_pending_two_factor(&self) -> bool {
        self.two_factor_secret.is_some() && !self.two_factor_enabled
    }
}
