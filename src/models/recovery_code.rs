//! Single-use recovery codes for two-factor accounts.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::sortable_id;
use crate::utils::recovery_codes::hash_recovery_code;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
/// Stored form of a recovery code. Only the SHA-256 digest of the
/// normalized `XXXX-XXXX` value is persisted; `used` transitions
/// false → true exactly once.
pub struct RecoveryCode {
    pub id: String,
    pub user_id: String,
    pub code_hash: String,
    pub used: bool,
}

impl RecoveryCode {
    pub fn new(user_id: &str, plaintext: &str) -> Self {
        Self {
            id: sortable_id(),
            user_id: user_id.to_string(),
            code_hash: hash_recovery_code(plaintext),
            used: false,
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        !self.used && self.code_hash == hash_recovery_code(candidate)
    }
}
