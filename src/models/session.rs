//! Models for tracking authenticated sessions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::sortable_id;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Database representation of an authenticated session.
///
/// Expiry is wall-clock only: nothing sweeps expired rows eagerly, so
/// callers must check [`AuthSession::is_expired`] at use time. `revoked`
/// is monotonic; once set it never reverts.
pub struct AuthSession {
    /// Time-ordered unique identifier for the session.
    pub id: String,
    /// User the session belongs to.
    pub user_id: String,
    /// Client IP captured at issuance.
    pub ip_address: String,
    /// Client user agent captured at issuance.
    pub user_agent: String,
    /// Timestamp when the session was issued.
    pub issued_at: DateTime<Utc>,
    /// Timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
    /// Whether the long-lived remember-me lifetime was requested.
    pub remember_me: bool,
    /// Whether the session has been revoked.
    pub revoked: bool,
}

impl AuthSession {
    pub fn new(
        user_id: &str,
        ip_address: &str,
        user_agent: &str,
        ttl_secs: u64,
        remember_me: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: sortable_id(),
            user_id: user_id.to_string(),
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
            issued_at: now,
            expires_at: now + Duration::seconds(ttl_secs as i64),
            remember_me,
            revoked: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Returns `true` while the session is fresh enough for sudo-mode
    /// operations (issued within `window_secs` of `now`).
    pub fn is_sudo_fresh(&self, now: DateTime<Utc>, window_secs: u64) -> bool {
        now - self.issued_at < Duration::seconds(window_secs as i64)
    }
}
