//! Short-lived bridge between password verification and 2FA verification.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::sortable_id;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Record representing "password verified, second factor not yet verified".
/// Deleted once resolved, never reused.
pub struct PendingTwoFactor {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingTwoFactor {
    pub fn new(user_id: &str, ttl_secs: u64) -> Self {
        let now = Utc::now();
        Self {
            id: sortable_id(),
            user_id: user_id.to_string(),
            created_at: now,
            expires_at: now + Duration::seconds(ttl_secs as i64),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
