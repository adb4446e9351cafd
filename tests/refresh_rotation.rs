mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use authkeeper::error::AuthError;
use authkeeper::events::{AuthEvent, TheftReason};
use authkeeper::models::AuthRefreshToken;
use authkeeper::repositories::memory::{MemoryRefreshTokenStore, MemorySessionStore};
use authkeeper::repositories::{RefreshTokenStore, SessionStore};
use authkeeper::utils::jwt::verify_access_token;

use support::{
    expect_authenticated, harness, harness_with, harness_with_token_store, meta, test_config,
};

#[tokio::test]
async fn rotation_issues_a_new_pair_and_supersedes_the_old_token() {
    let h = harness();
    h.add_user("user-1", "alice@example.com", "correct horse");
    let initial = expect_authenticated(
        h.service
            .sign_in("alice@example.com", "correct horse", &meta(), false)
            .await
            .unwrap(),
    );

    let rotated = h
        .service
        .refresh(&initial.refresh_token, &meta())
        .await
        .unwrap();

    assert_eq!(rotated.session.id, initial.session.id);
    assert_ne!(rotated.refresh_token, initial.refresh_token);

    let config = test_config();
    let claims = verify_access_token(
        &rotated.access_token,
        &config.jwt_secret,
        &config.jwt_issuer,
        &config.jwt_audience,
    )
    .unwrap();
    assert_eq!(claims.sid, initial.session.id);
    assert_eq!(claims.sub, "user-1");

    let tokens = h
        .refresh_tokens
        .find_by_session(&initial.session.id)
        .await
        .unwrap();
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens.iter().filter(|token| token.rotated).count(), 1);
    assert!(h
        .events
        .events()
        .iter()
        .any(|event| matches!(event, AuthEvent::RefreshTokenRotated { .. })));
}

#[tokio::test]
async fn one_reuse_within_the_grace_window_is_tolerated() {
    let h = harness();
    h.add_user("user-1", "alice@example.com", "correct horse");
    let initial = expect_authenticated(
        h.service
            .sign_in("alice@example.com", "correct horse", &meta(), false)
            .await
            .unwrap(),
    );

    h.service
        .refresh(&initial.refresh_token, &meta())
        .await
        .unwrap();
    // The client that never received the rotated pair retries.
    let second = h
        .service
        .refresh(&initial.refresh_token, &meta())
        .await
        .unwrap();

    assert_eq!(second.session.id, initial.session.id);
    assert!(!h.sessions.get(&initial.session.id).unwrap().revoked);
    assert!(!h
        .events
        .events()
        .iter()
        .any(|event| matches!(event, AuthEvent::RefreshTokenTheftDetected { .. })));
}

#[tokio::test]
async fn a_third_presentation_revokes_the_whole_session() {
    let h = harness();
    h.add_user("user-1", "alice@example.com", "correct horse");
    let initial = expect_authenticated(
        h.service
            .sign_in("alice@example.com", "correct horse", &meta(), false)
            .await
            .unwrap(),
    );

    h.service
        .refresh(&initial.refresh_token, &meta())
        .await
        .unwrap();
    h.service
        .refresh(&initial.refresh_token, &meta())
        .await
        .unwrap();
    let result = h.service.refresh(&initial.refresh_token, &meta()).await;
    assert!(matches!(result, Err(AuthError::Unauthorized)));

    assert!(h.sessions.get(&initial.session.id).unwrap().revoked);
    let tokens = h
        .refresh_tokens
        .find_by_session(&initial.session.id)
        .await
        .unwrap();
    assert!(tokens.iter().all(|token| token.revoked));
    assert!(h.events.events().iter().any(|event| matches!(
        event,
        AuthEvent::RefreshTokenTheftDetected {
            reason: TheftReason::DoubleGraceUse,
            ..
        }
    )));
}

#[tokio::test]
async fn reuse_after_the_grace_window_is_theft() {
    let mut config = test_config();
    config.refresh_grace_window_secs = 0;
    let h = harness_with(config);
    h.add_user("user-1", "alice@example.com", "correct horse");
    let initial = expect_authenticated(
        h.service
            .sign_in("alice@example.com", "correct horse", &meta(), false)
            .await
            .unwrap(),
    );

    let rotated = h
        .service
        .refresh(&initial.refresh_token, &meta())
        .await
        .unwrap();
    let result = h.service.refresh(&initial.refresh_token, &meta()).await;
    assert!(matches!(result, Err(AuthError::Unauthorized)));
    assert!(h.events.events().iter().any(|event| matches!(
        event,
        AuthEvent::RefreshTokenTheftDetected {
            reason: TheftReason::GracePeriodExpired,
            ..
        }
    )));

    // The cascade also killed the legitimately rotated token.
    let result = h.service.refresh(&rotated.refresh_token, &meta()).await;
    assert!(matches!(result, Err(AuthError::Unauthorized)));
}

#[tokio::test]
async fn unknown_tokens_are_rejected_without_side_effects() {
    let h = harness();
    let result = h.service.refresh("not-a-real-token", &meta()).await;
    assert!(matches!(result, Err(AuthError::Unauthorized)));
    assert!(h.events.events().is_empty());
}

#[tokio::test]
async fn revoked_tokens_stay_dead_without_triggering_theft() {
    let h = harness();
    h.add_user("user-1", "alice@example.com", "correct horse");
    let initial = expect_authenticated(
        h.service
            .sign_in("alice@example.com", "correct horse", &meta(), false)
            .await
            .unwrap(),
    );

    h.service.sign_out(&initial.session.id).await.unwrap();
    let result = h.service.refresh(&initial.refresh_token, &meta()).await;
    assert!(matches!(result, Err(AuthError::Unauthorized)));
    assert!(!h
        .events
        .events()
        .iter()
        .any(|event| matches!(event, AuthEvent::RefreshTokenTheftDetected { .. })));
}

#[tokio::test]
async fn expired_tokens_are_rejected() {
    let mut config = test_config();
    config.refresh_token_ttl_secs = 0;
    let h = harness_with(config);
    h.add_user("user-1", "alice@example.com", "correct horse");
    let initial = expect_authenticated(
        h.service
            .sign_in("alice@example.com", "correct horse", &meta(), false)
            .await
            .unwrap(),
    );

    let result = h.service.refresh(&initial.refresh_token, &meta()).await;
    assert!(matches!(result, Err(AuthError::Unauthorized)));
}

/// Token store where every rotation attempt loses to a concurrent caller
/// whose own reuse was then judged theft: by the time this caller
/// proceeds, the cascade has revoked the session and all its tokens.
struct RotationRacedStore {
    inner: Arc<MemoryRefreshTokenStore>,
    sessions: Arc<MemorySessionStore>,
}

#[async_trait]
impl RefreshTokenStore for RotationRacedStore {
    async fn create(&self, token: &AuthRefreshToken) -> Result<(), AuthError> {
        self.inner.create(token).await
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<AuthRefreshToken>, AuthError> {
        self.inner.find_by_hash(token_hash).await
    }

    async fn find_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<AuthRefreshToken>, AuthError> {
        self.inner.find_by_session(session_id).await
    }

    async fn mark_rotated(
        &self,
        token_id: &str,
        rotated_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        self.inner.mark_rotated(token_id, rotated_at).await?;
        if let Some(token) = self.inner.get(token_id) {
            self.sessions.revoke(&token.session_id).await?;
            self.inner.revoke_for_session(&token.session_id).await?;
        }
        Ok(false)
    }

    async fn mark_grace_used(&self, token_id: &str) -> Result<bool, AuthError> {
        self.inner.mark_grace_used(token_id).await
    }

    async fn revoke(&self, token_id: &str) -> Result<bool, AuthError> {
        self.inner.revoke(token_id).await
    }

    async fn revoke_for_session(&self, session_id: &str) -> Result<u64, AuthError> {
        self.inner.revoke_for_session(session_id).await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        self.inner.delete_expired(now).await
    }
}

#[tokio::test]
async fn grace_branch_refuses_a_session_revoked_mid_flight() {
    let h = harness_with_token_store(test_config(), |tokens, sessions| {
        Arc::new(RotationRacedStore {
            inner: tokens,
            sessions,
        })
    });
    h.add_user("user-1", "alice@example.com", "correct horse");
    let initial = expect_authenticated(
        h.service
            .sign_in("alice@example.com", "correct horse", &meta(), false)
            .await
            .unwrap(),
    );

    let result = h.service.refresh(&initial.refresh_token, &meta()).await;
    assert!(matches!(result, Err(AuthError::Unauthorized)));

    // No fresh pair was minted for the revoked session.
    assert!(h.sessions.get(&initial.session.id).unwrap().revoked);
    let tokens = h
        .refresh_tokens
        .find_by_session(&initial.session.id)
        .await
        .unwrap();
    assert_eq!(tokens.len(), 1);
    assert!(tokens.iter().all(|token| token.revoked));
}

/// Token store whose session-wide revocation always fails, standing in
/// for a storage outage during the theft cascade.
struct FailingCascadeStore {
    inner: Arc<MemoryRefreshTokenStore>,
    cascade_attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl RefreshTokenStore for FailingCascadeStore {
    async fn create(&self, token: &AuthRefreshToken) -> Result<(), AuthError> {
        self.inner.create(token).await
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<AuthRefreshToken>, AuthError> {
        self.inner.find_by_hash(token_hash).await
    }

    async fn find_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<AuthRefreshToken>, AuthError> {
        self.inner.find_by_session(session_id).await
    }

    async fn mark_rotated(
        &self,
        token_id: &str,
        rotated_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        self.inner.mark_rotated(token_id, rotated_at).await
    }

    async fn mark_grace_used(&self, token_id: &str) -> Result<bool, AuthError> {
        self.inner.mark_grace_used(token_id).await
    }

    async fn revoke(&self, token_id: &str) -> Result<bool, AuthError> {
        self.inner.revoke(token_id).await
    }

    async fn revoke_for_session(&self, _session_id: &str) -> Result<u64, AuthError> {
        self.cascade_attempts.fetch_add(1, Ordering::SeqCst);
        Err(AuthError::Internal(anyhow::anyhow!("revocation outage")))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        self.inner.delete_expired(now).await
    }
}

#[tokio::test]
async fn failed_theft_revocation_surfaces_after_one_retry() {
    let mut config = test_config();
    config.refresh_grace_window_secs = 0;
    let cascade_attempts = Arc::new(AtomicUsize::new(0));
    let attempts = cascade_attempts.clone();
    let h = harness_with_token_store(config, move |tokens, _sessions| {
        Arc::new(FailingCascadeStore {
            inner: tokens,
            cascade_attempts: attempts,
        })
    });
    h.add_user("user-1", "alice@example.com", "correct horse");
    let initial = expect_authenticated(
        h.service
            .sign_in("alice@example.com", "correct horse", &meta(), false)
            .await
            .unwrap(),
    );

    h.service
        .refresh(&initial.refresh_token, &meta())
        .await
        .unwrap();
    let result = h.service.refresh(&initial.refresh_token, &meta()).await;

    // The storage failure is not masked as a routine rejection, and the
    // cascade was attempted twice before giving up.
    assert!(matches!(result, Err(AuthError::Internal(_))));
    assert_eq!(cascade_attempts.load(Ordering::SeqCst), 2);
    assert!(!h
        .events
        .events()
        .iter()
        .any(|event| matches!(event, AuthEvent::RefreshTokenTheftDetected { .. })));
}

#[tokio::test]
async fn tokens_behind_a_revoked_session_are_rejected() {
    let h = harness();
    h.add_user("user-1", "alice@example.com", "correct horse");
    let initial = expect_authenticated(
        h.service
            .sign_in("alice@example.com", "correct horse", &meta(), false)
            .await
            .unwrap(),
    );

    h.sessions.revoke(&initial.session.id).await.unwrap();
    let result = h.service.refresh(&initial.refresh_token, &meta()).await;
    assert!(matches!(result, Err(AuthError::Unauthorized)));
}
