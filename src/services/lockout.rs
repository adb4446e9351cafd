//! Failed sign-in tracking and account lockout.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// Per-email failure counter consulted before any credential check.
///
/// `record_failure` must count atomically under concurrent failed
/// attempts; implementations back this with whatever shared counter the
/// deployment provides.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountLockoutService: Send + Sync {
    async fn is_locked(&self, email: &str) -> bool;
    /// Records one failure. Returns `true` only for the attempt that
    /// crossed the threshold and engaged the lock.
    async fn record_failure(&self, email: &str) -> bool;
    async fn clear_failures(&self, email: &str);
}

#[derive(Debug, Clone)]
struct FailureRecord {
    count: u32,
    window_started_at: DateTime<Utc>,
    locked_until: Option<DateTime<Utc>>,
}

/// Process-local lockout tracker with a time-windowed counter.
#[derive(Debug)]
pub struct InMemoryAccountLockout {
    threshold: u32,
    window: Duration,
    lock_duration: Duration,
    state: Mutex<HashMap<String, FailureRecord>>,
}

impl InMemoryAccountLockout {
    pub fn new(threshold: u32, window_secs: u64, lock_duration_secs: u64) -> Self {
        Self {
            threshold,
            window: Duration::seconds(window_secs as i64),
            lock_duration: Duration::seconds(lock_duration_secs as i64),
            state: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl AccountLockoutService for InMemoryAccountLockout {
    async fn is_locked(&self, email: &str) -> bool {
        let state = self.state.lock().expect("lockout lock");
        match state.get(email).and_then(|record| record.locked_until) {
            Some(until) => until > Utc::now(),
            None => false,
        }
    }

    async fn record_failure(&self, email: &str) -> bool {
        let now = Utc::now();
        let mut state = self.state.lock().expect("lockout lock");
        let record = state.entry(email.to_string()).or_insert(FailureRecord {
            count: 0,
            window_started_at: now,
            locked_until: None,
        });

        // Stale windows reset the counter rather than accumulating forever.
        if now - record.window_started_at > self.window {
            record.count = 0;
            record.window_started_at = now;
        }

        record.count += 1;
        let already_locked = record.locked_until.is_some_and(|until| until > now);
        if record.count >= self.threshold && !already_locked {
            record.locked_until = Some(now + self.lock_duration);
            return true;
        }
        false
    }

    async fn clear_failures(&self, email: &str) {
        self.state.lock().expect("lockout lock").remove(email);
    }
}
