//! Two-factor verification, enrollment lifecycle, and recovery codes.

use chrono::Utc;

use crate::error::AuthError;
use crate::events::{AuthEvent, RevocationReason, TwoFactorMethod};
use crate::models::RecoveryCode;
use crate::services::{AuthService, AuthenticatedSession, ClientMeta};
use crate::utils::mfa::{generate_otpauth_uri, generate_totp_secret};
use crate::utils::recovery_codes::generate_batch;

/// How a submitted second-factor code should be routed. Shape is decided
/// before any verifier runs; anything unrecognizable is rejected outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeClassification {
    /// Six ASCII digits: a TOTP code.
    Totp(String),
    /// `XXXX-XXXX` alphanumeric: a recovery code.
    Recovery(String),
    Invalid,
}

pub fn classify_code(code: &str) -> CodeClassification {
    let code = code.trim();
    if code.len() == 6 && code.chars().all(|c| c.is_ascii_digit()) {
        return CodeClassification::Totp(code.to_string());
    }
    let parts: Vec<&str> = code.split('-').collect();
    if parts.len() == 2
        && parts
            .iter()
            .all(|part| part.len() == 4 && part.chars().all(|c| c.is_ascii_alphanumeric()))
    {
        return CodeClassification::Recovery(code.to_string());
    }
    CodeClassification::Invalid
}

#[derive(Debug)]
/// One-time exposure of a freshly generated TOTP secret. Only the
/// encrypted form is persisted.
pub struct TwoFactorSetup {
    pub secret: String,
    pub otpauth_uri: String,
}

impl AuthService {
    /// Exchanges a pending two-factor handle plus a code for a full
    /// session. Every failure is a uniform `Unauthorized`; the
    /// `TwoFactorFailed` audit event never reveals which check missed.
    pub async fn complete_two_factor(
        &self,
        pending_id: &str,
        code: &str,
        meta: &ClientMeta,
        remember_me: bool,
    ) -> Result<AuthenticatedSession, AuthError> {
        let now = Utc::now();
        let pending = self
            .pending_two_factor
            .find_by_id(pending_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        if pending.is_expired(now) {
            return Err(AuthError::Unauthorized);
        }

        let user = self
            .users
            .find_by_id(&pending.user_id)
            .await?
            .filter(|user| user.two_factor_enabled)
            .ok_or(AuthError::Unauthorized)?;

        let Some(method) = self.verify_second_factor(&user, code).await? else {
            self.publish(AuthEvent::TwoFactorFailed {
                pending_session_id: pending.id.clone(),
                ip_address: meta.ip_address.clone(),
                reason: "invalid_code".to_string(),
            })
            .await;
            return Err(AuthError::Unauthorized);
        };

        let authenticated = self.start_session(&user, meta, remember_me).await?;
        self.pending_two_factor.delete(&pending.id).await?;
        self.publish(AuthEvent::TwoFactorCompleted {
            user_id: user.id.clone(),
            session_id: authenticated.session.id.clone(),
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
            method,
        })
        .await;

        Ok(authenticated)
    }

    /// Generates and stores a new (encrypted) TOTP secret. Two-factor
    /// stays disabled until [`AuthService::confirm_two_factor`] succeeds;
    /// the raw secret and provisioning URI are exposed this once.
    pub async fn setup_two_factor(&self, user_id: &str) -> Result<TwoFactorSetup, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        if user.two_factor_enabled {
            return Err(AuthError::AccessDenied);
        }

        let secret = generate_totp_secret();
        let otpauth_uri = generate_otpauth_uri(&self.config.mfa_issuer, &user.email, &secret)
            .map_err(AuthError::Internal)?;
        let encrypted = self.secret_encryptor.encrypt(&secret)?;
        self.users
            .store_two_factor_secret(&user.id, &encrypted)
            .await?;

        Ok(TwoFactorSetup {
            secret,
            otpauth_uri,
        })
    }

    /// Confirms enrollment with a first TOTP code. Enables two-factor,
    /// issues the recovery-code batch (returned in plaintext exactly
    /// once), and revokes every other session the user holds.
    pub async fn confirm_two_factor(
        &self,
        user_id: &str,
        current_session_id: &str,
        code: &str,
    ) -> Result<Vec<String>, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        if user.two_factor_enabled {
            return Err(AuthError::AccessDenied);
        }
        let encrypted = user
            .two_factor_secret
            .as_deref()
            .ok_or(AuthError::AccessDenied)?;

        let secret = self.secret_encryptor.decrypt(encrypted)?;
        if !self.totp.verify(&secret, code)? {
            return Err(AuthError::Unauthorized);
        }

        self.users.enable_two_factor(&user.id).await?;
        let codes = self.issue_recovery_codes(&user.id).await?;

        let revoked_count = self
            .revoke_sessions_for_user(&user.id, Some(current_session_id))
            .await?;
        self.publish(AuthEvent::AllSessionsRevoked {
            user_id: user.id.clone(),
            reason: RevocationReason::TwoFactorEnabled,
            revoked_count,
        })
        .await;
        self.publish(AuthEvent::TwoFactorEnabled {
            user_id: user.id.clone(),
            email: user.email.clone(),
        })
        .await;

        Ok(codes)
    }

    /// Disables two-factor after re-authenticating with either factor.
    /// Clears the secret and purges all recovery codes.
    pub async fn disable_two_factor(&self, user_id: &str, code: &str) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        if !user.two_factor_enabled {
            return Err(AuthError::AccessDenied);
        }

        if self.verify_second_factor(&user, code).await?.is_none() {
            return Err(AuthError::Unauthorized);
        }

        self.users.disable_two_factor(&user.id).await?;
        self.recovery_codes.delete_for_user(&user.id).await?;
        self.publish(AuthEvent::TwoFactorDisabled {
            user_id: user.id.clone(),
            email: user.email.clone(),
        })
        .await;
        Ok(())
    }

    /// Replaces the user's recovery codes with a fresh batch. Requires
    /// sudo mode: the calling session must have been issued within the
    /// configured freshness window, otherwise the caller has to
    /// re-authenticate first.
    pub async fn regenerate_recovery_codes(
        &self,
        user_id: &str,
        current_session_id: &str,
    ) -> Result<Vec<String>, AuthError> {
        let now = Utc::now();
        let session = self
            .sessions
            .find_by_id(current_session_id)
            .await?
            .filter(|session| session.user_id == user_id && !session.revoked)
            .ok_or(AuthError::Unauthorized)?;
        if session.is_expired(now) {
            return Err(AuthError::Unauthorized);
        }
        if !session.is_sudo_fresh(now, self.config.sudo_mode_window_secs) {
            return Err(AuthError::AccessDenied);
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;
        if !user.two_factor_enabled {
            return Err(AuthError::AccessDenied);
        }

        self.issue_recovery_codes(&user.id).await
    }

    /// Routes the code by shape and runs exactly one verifier. Returns the
    /// satisfied method, or `None` on any miss; callers must not leak
    /// which check failed.
    pub(crate) async fn verify_second_factor(
        &self,
        user: &crate::models::User,
        code: &str,
    ) -> Result<Option<TwoFactorMethod>, AuthError> {
        match classify_code(code) {
            CodeClassification::Totp(code) => {
                let encrypted = user
                    .two_factor_secret
                    .as_deref()
                    .ok_or(AuthError::Unauthorized)?;
                let secret = self.secret_encryptor.decrypt(encrypted)?;
                if self.totp.verify(&secret, &code)? {
                    Ok(Some(TwoFactorMethod::Totp))
                } else {
                    Ok(None)
                }
            }
            CodeClassification::Recovery(code) => {
                for candidate in self.recovery_codes.list_unused_for_user(&user.id).await? {
                    // mark_used is a compare-and-swap: a concurrent use of
                    // the same code wins at most once.
                    if candidate.matches(&code)
                        && self.recovery_codes.mark_used(&candidate.id).await?
                    {
                        return Ok(Some(TwoFactorMethod::RecoveryCode));
                    }
                }
                Ok(None)
            }
            CodeClassification::Invalid => Ok(None),
        }
    }

    async fn issue_recovery_codes(&self, user_id: &str) -> Result<Vec<String>, AuthError> {
        let plaintexts = generate_batch();
        let records: Vec<RecoveryCode> = plaintexts
            .iter()
            .map(|code| RecoveryCode::new(user_id, code))
            .collect();
        self.recovery_codes
            .replace_for_user(user_id, &records)
            .await?;
        Ok(plaintexts)
    }
}
