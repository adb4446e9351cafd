//! Refresh-token rotation with grace-window reuse tolerance and theft
//! detection.
//!
//! Per-token state machine: active → rotated → grace-used → terminal
//! (revoked/expired), with `revoked` applicable at any state. Rotation is
//! single-use; one benign reuse of a superseded token is tolerated inside
//! a bounded window anchored at the rotation timestamp. Anything beyond
//! that is treated as replay of a stolen token.

use chrono::{Duration, Utc};

use crate::error::AuthError;
use crate::events::{AuthEvent, TheftReason};
use crate::models::{AuthRefreshToken, AuthSession, User};
use crate::services::{hash_refresh_token, AuthService, AuthenticatedSession, ClientMeta};

impl AuthService {
    /// Exchanges a refresh token for a fresh refresh/access pair.
    ///
    /// Failures are a uniform `Unauthorized`: callers cannot distinguish
    /// unknown, revoked, expired, or stolen tokens.
    pub async fn refresh(
        &self,
        plain_token: &str,
        meta: &ClientMeta,
    ) -> Result<AuthenticatedSession, AuthError> {
        let now = Utc::now();
        let token_hash = hash_refresh_token(plain_token);

        let token = self
            .refresh_tokens
            .find_by_hash(&token_hash)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        if token.revoked || token.is_expired(now) {
            return Err(AuthError::Unauthorized);
        }

        // A token behind a missing or revoked session is terminal; this
        // should not occur under normal operation.
        let session = self
            .sessions
            .find_by_id(&token.session_id)
            .await?
            .filter(|session| !session.revoked)
            .ok_or(AuthError::Unauthorized)?;
        let user = self
            .users
            .find_by_id(&session.user_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        // Happy path: conditional update so that of two racing duplicate
        // requests exactly one rotates; the other observes `false` and
        // falls through to the grace-window decision.
        if self.refresh_tokens.mark_rotated(&token.id, now).await? {
            return self.rotate_into_new_pair(&user, session).await;
        }

        // The token was already superseded. Re-read it so the decision is
        // based on the rotation timestamp the winning request persisted; a
        // token revoked in the meantime is terminal.
        let token = self
            .refresh_tokens
            .find_by_hash(&token_hash)
            .await?
            .filter(|token| !token.revoked)
            .ok_or(AuthError::Unauthorized)?;
        let rotated_at = token.rotated_at.ok_or(AuthError::Unauthorized)?;

        let now = Utc::now();
        let grace = Duration::seconds(self.config.refresh_grace_window_secs as i64);
        let within_grace = now < rotated_at + grace;

        if within_grace && self.refresh_tokens.mark_grace_used(&token.id).await? {
            // Benign retry: the legitimate client never saw the rotated
            // pair. Re-confirm the session survived any concurrent theft
            // cascade, then issue another pair; the allowance is consumed.
            let session = self
                .sessions
                .find_by_id(&token.session_id)
                .await?
                .filter(|session| !session.revoked)
                .ok_or(AuthError::Unauthorized)?;
            return self.rotate_into_new_pair(&user, session).await;
        }

        let reason = if within_grace {
            TheftReason::DoubleGraceUse
        } else {
            TheftReason::GracePeriodExpired
        };
        Err(self.detect_theft(&token, &session, &user, meta, reason).await)
    }

    async fn rotate_into_new_pair(
        &self,
        user: &User,
        session: AuthSession,
    ) -> Result<AuthenticatedSession, AuthError> {
        let session_id = session.id.clone();
        let pair = self.issue_for_session(user, session).await?;
        self.publish(AuthEvent::RefreshTokenRotated {
            session_id,
            user_id: user.id.clone(),
        })
        .await;
        Ok(pair)
    }

    /// Treats the presented token as stolen: revokes the owning session
    /// and every refresh token linked to it, then returns the terminal
    /// error. The revocation must land; it is retried once and a storage
    /// failure is surfaced so the embedding layer can alert.
    async fn detect_theft(
        &self,
        token: &AuthRefreshToken,
        session: &AuthSession,
        user: &User,
        meta: &ClientMeta,
        reason: TheftReason,
    ) -> AuthError {
        let mut outcome = self.revoke_compromised(token, &session.id).await;
        if outcome.is_err() {
            outcome = self.revoke_compromised(token, &session.id).await;
        }
        if let Err(err) = outcome {
            tracing::error!(
                session_id = %session.id,
                error = %err,
                "failed to revoke after refresh-token theft detection"
            );
            return err;
        }

        self.publish(AuthEvent::RefreshTokenTheftDetected {
            session_id: session.id.clone(),
            user_id: user.id.clone(),
            ip_address: meta.ip_address.clone(),
            reason,
        })
        .await;

        AuthError::Unauthorized
    }

    async fn revoke_compromised(
        &self,
        token: &AuthRefreshToken,
        session_id: &str,
    ) -> Result<(), AuthError> {
        self.sessions.revoke(session_id).await?;
        self.refresh_tokens.revoke_for_session(session_id).await?;
        // The presented token gets revoked even if the session lookup
        // missed it.
        self.refresh_tokens.revoke(&token.id).await?;
        Ok(())
    }
}
