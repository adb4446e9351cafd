//! Sign-in orchestration: lockout, anti-enumeration credential check,
//! and either direct issuance or a pending two-factor handle.

use crate::error::AuthError;
use crate::events::AuthEvent;
use crate::models::PendingTwoFactor;
use crate::services::{AuthService, ClientMeta, SignInOutcome};

impl AuthService {
    /// Authenticates an email/password pair.
    ///
    /// A failed attempt never leaves partial state: no session or token
    /// row exists unless the outcome is `Authenticated`.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        meta: &ClientMeta,
        remember_me: bool,
    ) -> Result<SignInOutcome, AuthError> {
        let email = normalize_email(email);

        if self.lockout.is_locked(&email).await {
            self.publish(AuthEvent::AccountLockedOut {
                email,
                ip_address: meta.ip_address.clone(),
                user_agent: meta.user_agent.clone(),
            })
            .await;
            return Err(AuthError::Locked);
        }

        let user = match self.users.find_by_email(&email).await? {
            Some(user) => {
                if !self.hasher.verify(&user.password_hash, password)? {
                    return Err(self.handle_invalid_credentials(&email, meta).await);
                }
                user
            }
            None => {
                // Burn the same hashing cost for unknown emails so response
                // timing cannot be used to enumerate accounts.
                let _ = self.hasher.verify(&self.dummy_password_hash, password)?;
                return Err(self.handle_invalid_credentials(&email, meta).await);
            }
        };

        self.lockout.clear_failures(&email).await;

        if user.two_factor_enabled {
            let pending =
                PendingTwoFactor::new(&user.id, self.config.pending_two_factor_ttl_secs);
            self.pending_two_factor.create(&pending).await?;
            return Ok(SignInOutcome::TwoFactorRequired {
                pending_id: pending.id,
            });
        }

        let authenticated = self.start_session(&user, meta, remember_me).await?;
        self.publish(AuthEvent::UserSignedIn {
            user_id: user.id.clone(),
            email: user.email.clone(),
            session_id: authenticated.session.id.clone(),
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
        })
        .await;

        Ok(SignInOutcome::Authenticated(Box::new(authenticated)))
    }

    /// Records the failure and decides between `Unauthorized` and `Locked`
    /// (when this very attempt engaged the lock).
    async fn handle_invalid_credentials(&self, email: &str, meta: &ClientMeta) -> AuthError {
        let just_locked = self.lockout.record_failure(email).await;
        self.publish(AuthEvent::SignInFailed {
            email: email.to_string(),
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
        })
        .await;

        if just_locked {
            self.publish(AuthEvent::AccountLockedOut {
                email: email.to_string(),
                ip_address: meta.ip_address.clone(),
                user_agent: meta.user_agent.clone(),
            })
            .await;
            AuthError::Locked
        } else {
            AuthError::Unauthorized
        }
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
