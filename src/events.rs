//! Audit events emitted by the engine and the publisher collaborator.
//!
//! Publishing is fire-and-forget: implementations must absorb their own
//! failures (log and continue) so that an audit outage can never mask or
//! reverse a primary state transition such as a theft-triggered revocation.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Which second factor satisfied a verification.
pub enum TwoFactorMethod {
    Totp,
    RecoveryCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Why a session cascade ran.
pub enum RevocationReason {
    UserInitiated,
    PasswordChanged,
    TwoFactorEnabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Why a refresh-token replay was classified as theft.
pub enum TheftReason {
    GracePeriodExpired,
    DoubleGraceUse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEvent {
    UserSignedIn {
        user_id: String,
        email: String,
        session_id: String,
        ip_address: String,
        user_agent: String,
    },
    SignInFailed {
        email: String,
        ip_address: String,
        user_agent: String,
    },
    AccountLockedOut {
        email: String,
        ip_address: String,
        user_agent: String,
    },
    TwoFactorCompleted {
        user_id: String,
        session_id: String,
        ip_address: String,
        user_agent: String,
        method: TwoFactorMethod,
    },
    TwoFactorFailed {
        pending_session_id: String,
        ip_address: String,
        reason: String,
    },
    TwoFactorEnabled {
        user_id: String,
        email: String,
    },
    TwoFactorDisabled {
        user_id: String,
        email: String,
    },
    SessionRevoked {
        user_id: String,
        session_id: String,
        reason: RevocationReason,
    },
    AllSessionsRevoked {
        user_id: String,
        reason: RevocationReason,
        revoked_count: u64,
    },
    RefreshTokenRotated {
        session_id: String,
        user_id: String,
    },
    RefreshTokenTheftDetected {
        session_id: String,
        user_id: String,
        ip_address: String,
        reason: TheftReason,
    },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: AuthEvent);
}

/// Default publisher: emits events as structured tracing records on the
/// `authkeeper::audit` target.
#[derive(Debug, Default)]
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, event: AuthEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => {
                tracing::info!(target: "authkeeper::audit", event = %payload, "audit event")
            }
            Err(err) => {
                tracing::warn!(target: "authkeeper::audit", error = %err, "failed to serialize audit event")
            }
        }
    }
}

/// Captures events in memory; the integration suites assert on it.
#[derive(Debug, Default)]
pub struct MemoryEventPublisher {
    events: Mutex<Vec<AuthEvent>>,
}

impl MemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuthEvent> {
        self.events.lock().expect("event lock").clone()
    }

    pub fn clear(&self) {
        self.events.lock().expect("event lock").clear();
    }
}

#[async_trait]
impl EventPublisher for MemoryEventPublisher {
    async fn publish(&self, event: AuthEvent) {
        self.events.lock().expect("event lock").push(event);
    }
}
