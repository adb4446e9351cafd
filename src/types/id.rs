//! Identifier generators for persisted records and token correlation.

use uuid::Uuid;

/// Generates a time-ordered identifier (UUIDv7) for sessions, refresh
/// tokens, and pending two-factor records. Sorting by id sorts by creation
/// time, which keeps token chains auditable.
pub fn sortable_id() -> String {
    Uuid::now_v7().to_string()
}

/// Generates a random identifier (UUIDv4) for `jti` claims and event
/// correlation, where ordering must not leak creation time.
pub fn random_id() -> String {
    Uuid::new_v4().to_string()
}
