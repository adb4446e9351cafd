//! Session revocation cascades: sign-out, global sign-out, and the
//! all-but-current sweeps run on password change and two-factor enable.
//!
//! Every path is idempotent and commutative: already-revoked rows are
//! skipped, never re-revoked or double-counted, so concurrent revokers
//! converge.

use crate::error::AuthError;
use crate::events::{AuthEvent, RevocationReason};
use crate::services::AuthService;

impl AuthService {
    /// Revokes a single session and its refresh tokens.
    pub async fn sign_out(&self, session_id: &str) -> Result<(), AuthError> {
        let session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        let newly_revoked = self.sessions.revoke(session_id).await?;
        self.refresh_tokens.revoke_for_session(session_id).await?;

        if newly_revoked {
            self.publish(AuthEvent::SessionRevoked {
                user_id: session.user_id,
                session_id: session_id.to_string(),
                reason: RevocationReason::UserInitiated,
            })
            .await;
        }
        Ok(())
    }

    /// Revokes every live session belonging to the user. Returns the
    /// number of sessions actually revoked by this call.
    pub async fn sign_out_all(&self, user_id: &str) -> Result<u64, AuthError> {
        let revoked_count = self
            .revoke_sessions_for_user(user_id, None)
            .await?;
        self.publish(AuthEvent::AllSessionsRevoked {
            user_id: user_id.to_string(),
            reason: RevocationReason::UserInitiated,
            revoked_count,
        })
        .await;
        Ok(revoked_count)
    }

    /// Verifies the current password, stores a new hash, and revokes every
    /// session except the one the change originated from.
    pub async fn change_password(
        &self,
        user_id: &str,
        current_session_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        if !self.hasher.verify(&user.password_hash, current_password)? {
            return Err(AuthError::Unauthorized);
        }

        let new_hash = self.hasher.hash(new_password)?;
        self.users.update_password_hash(user_id, &new_hash).await?;

        let revoked_count = self
            .revoke_sessions_for_user(user_id, Some(current_session_id))
            .await?;
        self.publish(AuthEvent::AllSessionsRevoked {
            user_id: user_id.to_string(),
            reason: RevocationReason::PasswordChanged,
            revoked_count,
        })
        .await;
        Ok(())
    }

    /// Sweeps the user's live sessions, optionally sparing one, cascading
    /// to each session's refresh tokens. Returns how many sessions this
    /// call actually revoked.
    pub(crate) async fn revoke_sessions_for_user(
        &self,
        user_id: &str,
        spare_session_id: Option<&str>,
    ) -> Result<u64, AuthError> {
        let sessions = self.sessions.list_active_for_user(user_id).await?;
        let mut revoked_count = 0;
        for session in sessions {
            if spare_session_id == Some(session.id.as_str()) {
                continue;
            }
            if self.sessions.revoke(&session.id).await? {
                revoked_count += 1;
            }
            self.refresh_tokens.revoke_for_session(&session.id).await?;
        }
        Ok(revoked_count)
    }
}
