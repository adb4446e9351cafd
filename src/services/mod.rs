//! Orchestrators tying stores, verifiers, and the event publisher together.

pub mod lockout;
pub mod refresh;
pub mod revocation;
pub mod sign_in;
pub mod two_factor;

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::AuthError;
use crate::events::{AuthEvent, EventPublisher};
use crate::models::{AuthRefreshToken, AuthSession, User};
use crate::repositories::{
    PendingTwoFactorStore, RecoveryCodeStore, RefreshTokenStore, SessionStore, UserStore,
};
use crate::utils::jwt::{AccessTokenIssuer, Claims};
use crate::utils::mfa::{TotpVerifier, TwoFactorSecretEncryptor};
use crate::utils::password::CredentialHasher;

use lockout::AccountLockoutService;

/// Password hashed once at construction and verified against whenever a
/// sign-in targets an unknown email, so the response time matches a
/// real-but-wrong-password attempt.
const DUMMY_PASSWORD: &str = "authkeeper-dummy-credential";

const REFRESH_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Client context captured at the HTTP boundary and threaded through for
/// session records and audit events.
pub struct ClientMeta {
    pub ip_address: String,
    pub user_agent: String,
}

impl ClientMeta {
    pub fn new(ip_address: &str, user_agent: &str) -> Self {
        Self {
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
        }
    }
}

#[derive(Debug)]
/// Fully authenticated result: a live session plus its token pair. The
/// refresh token is the plaintext bearer value; it is returned exactly
/// once and only its hash is stored.
pub struct AuthenticatedSession {
    pub session: AuthSession,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug)]
pub enum SignInOutcome {
    Authenticated(Box<AuthenticatedSession>),
    /// Password verified but a second factor is still required; the handle
    /// references a short-lived pending record.
    TwoFactorRequired { pending_id: String },
}

/// Collaborators injected into [`AuthService`].
pub struct AuthServiceDeps {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub pending_two_factor: Arc<dyn PendingTwoFactorStore>,
    pub recovery_codes: Arc<dyn RecoveryCodeStore>,
    pub lockout: Arc<dyn AccountLockoutService>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub secret_encryptor: Arc<dyn TwoFactorSecretEncryptor>,
    pub totp: Arc<dyn TotpVerifier>,
    pub token_issuer: Arc<dyn AccessTokenIssuer>,
    pub events: Arc<dyn EventPublisher>,
}

/// The authentication engine. One instance serves arbitrarily many
/// parallel requests; all shared state lives behind the stores.
pub struct AuthService {
    pub(crate) config: Config,
    pub(crate) users: Arc<dyn UserStore>,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub(crate) pending_two_factor: Arc<dyn PendingTwoFactorStore>,
    pub(crate) recovery_codes: Arc<dyn RecoveryCodeStore>,
    pub(crate) lockout: Arc<dyn AccountLockoutService>,
    pub(crate) hasher: Arc<dyn CredentialHasher>,
    pub(crate) secret_encryptor: Arc<dyn TwoFactorSecretEncryptor>,
    pub(crate) totp: Arc<dyn TotpVerifier>,
    pub(crate) token_issuer: Arc<dyn AccessTokenIssuer>,
    pub(crate) events: Arc<dyn EventPublisher>,
    pub(crate) dummy_password_hash: String,
}

impl AuthService {
    /// Builds the engine. The anti-enumeration dummy hash is computed here,
    /// once per instance, as an explicit initialization step.
    pub fn new(config: Config, deps: AuthServiceDeps) -> Result<Self, AuthError> {
        let dummy_password_hash = deps.hasher.hash(DUMMY_PASSWORD)?;
        Ok(Self {
            config,
            users: deps.users,
            sessions: deps.sessions,
            refresh_tokens: deps.refresh_tokens,
            pending_two_factor: deps.pending_two_factor,
            recovery_codes: deps.recovery_codes,
            lockout: deps.lockout,
            hasher: deps.hasher,
            secret_encryptor: deps.secret_encryptor,
            totp: deps.totp,
            token_issuer: deps.token_issuer,
            events: deps.events,
            dummy_password_hash,
        })
    }

    /// Creates a session for the user and issues the initial token pair.
    pub(crate) async fn start_session(
        &self,
        user: &User,
        meta: &ClientMeta,
        remember_me: bool,
    ) -> Result<AuthenticatedSession, AuthError> {
        let ttl = if remember_me {
            self.config.session_remember_ttl_secs
        } else {
            self.config.session_ttl_secs
        };
        let session = AuthSession::new(
            &user.id,
            &meta.ip_address,
            &meta.user_agent,
            ttl,
            remember_me,
        );
        self.sessions.create(&session).await?;
        self.issue_for_session(user, session).await
    }

    /// Mints a fresh refresh token and access token for an existing
    /// session. Shared by sign-in, two-factor completion, and rotation.
    pub(crate) async fn issue_for_session(
        &self,
        user: &User,
        session: AuthSession,
    ) -> Result<AuthenticatedSession, AuthError> {
        let refresh_secret = generate_refresh_secret();
        let token = AuthRefreshToken::new(
            &session.id,
            &hash_refresh_token(&refresh_secret),
            self.config.refresh_token_ttl_secs,
        );
        self.refresh_tokens.create(&token).await?;

        let claims = Claims::new(
            &user.id,
            &session.id,
            &user.roles,
            &self.config.jwt_issuer,
            &self.config.jwt_audience,
            self.config.access_token_ttl_secs,
        );
        let access_token = self.token_issuer.generate(&claims)?;

        Ok(AuthenticatedSession {
            session,
            access_token,
            refresh_token: refresh_secret,
        })
    }

    pub(crate) async fn publish(&self, event: AuthEvent) {
        self.events.publish(event).await;
    }
}

/// High-entropy opaque bearer value for refresh tokens.
pub(crate) fn generate_refresh_secret() -> String {
    let mut bytes = [0u8; REFRESH_SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// One-way hash under which refresh tokens are stored and looked up.
pub(crate) fn hash_refresh_token(plain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plain.as_bytes());
    format!("{:x}", hasher.finalize())
}
