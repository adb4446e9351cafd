//! Refresh-token model backing the rotation state machine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::sortable_id;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Database representation of a refresh token.
///
/// Only a one-way hash of the opaque bearer value is stored. Rotation
/// never mutates the hash in place: a superseding row is inserted and the
/// old row is marked `rotated`, preserving an auditable chain. States move
/// active → rotated → grace-used, with `revoked` applicable at any point.
pub struct AuthRefreshToken {
    /// Time-ordered unique identifier for the token row.
    pub id: String,
    /// Session this token belongs to.
    pub session_id: String,
    /// SHA-256 hex digest of the opaque bearer value.
    pub token_hash: String,
    /// Timestamp when the token was issued.
    pub issued_at: DateTime<Utc>,
    /// Timestamp when the token expires.
    pub expires_at: DateTime<Utc>,
    /// Whether the token has been revoked.
    pub revoked: bool,
    /// Set exactly once, when a newer token has been issued from this one.
    pub rotated: bool,
    /// When rotation happened; anchors the reuse grace window.
    pub rotated_at: Option<DateTime<Utc>>,
    /// Set when the one-shot grace-window reuse has been consumed.
    pub grace_used: bool,
}

impl AuthRefreshToken {
    pub fn new(session_id: &str, token_hash: &str, ttl_secs: u64) -> Self {
        let now = Utc::now();
        Self {
            id: sortable_id(),
            session_id: session_id.to_string(),
            token_hash: token_hash.to_string(),
            issued_at: now,
            expires_at: now + Duration::seconds(ttl_secs as i64),
            revoked: false,
            rotated: false,
            rotated_at: None,
            grace_used: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
