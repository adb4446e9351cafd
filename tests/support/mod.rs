#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use authkeeper::config::Config;
use authkeeper::error::AuthError;
use authkeeper::events::MemoryEventPublisher;
use authkeeper::models::User;
use authkeeper::repositories::memory::{
    MemoryPendingTwoFactorStore, MemoryRecoveryCodeStore, MemoryRefreshTokenStore,
    MemorySessionStore, MemoryUserStore,
};
use authkeeper::repositories::RefreshTokenStore;
use authkeeper::services::lockout::InMemoryAccountLockout;
use authkeeper::services::{
    AuthService, AuthServiceDeps, AuthenticatedSession, ClientMeta, SignInOutcome,
};
use authkeeper::utils::jwt::JwtAccessTokenIssuer;
use authkeeper::utils::mfa::{AesGcmSecretEncryptor, TotpVerifier, TwoFactorSecretEncryptor};
use authkeeper::utils::password::CredentialHasher;

/// Fixed TOTP code the stub verifier accepts.
pub const VALID_TOTP_CODE: &str = "654321";
/// A wrong-but-well-formed TOTP code.
pub const WRONG_TOTP_CODE: &str = "111111";

/// Fast deterministic hasher so the suites do not pay argon2 cost per
/// sign-in; counts `verify` calls so tests can assert the lockout
/// short-circuit skips the credential check entirely.
#[derive(Debug, Default)]
pub struct CountingHasher {
    verify_calls: AtomicUsize,
}

impl CountingHasher {
    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

impl CredentialHasher for CountingHasher {
    fn hash(&self, plain: &str) -> Result<String, AuthError> {
        Ok(format!("{:x}", Sha256::digest(plain.as_bytes())))
    }

    fn verify(&self, hash: &str, plain: &str) -> Result<bool, AuthError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(hash == format!("{:x}", Sha256::digest(plain.as_bytes())))
    }
}

/// Stub TOTP verifier: accepts exactly [`VALID_TOTP_CODE`] and counts
/// invocations so tests can assert malformed codes never reach it.
#[derive(Debug, Default)]
pub struct StaticTotpVerifier {
    calls: AtomicUsize,
}

impl StaticTotpVerifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TotpVerifier for StaticTotpVerifier {
    fn verify(&self, _secret: &str, code: &str) -> Result<bool, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(code == VALID_TOTP_CODE)
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        jwt_secret: "a_secure_token_that_is_long_enough_123".to_string(),
        jwt_issuer: "authkeeper".to_string(),
        jwt_audience: "authkeeper-api".to_string(),
        access_token_ttl_secs: 900,
        session_ttl_secs: 900,
        session_remember_ttl_secs: 2_592_000,
        refresh_token_ttl_secs: 2_592_000,
        refresh_grace_window_secs: 60,
        pending_two_factor_ttl_secs: 300,
        sudo_mode_window_secs: 300,
        lockout_threshold: 5,
        lockout_window_secs: 900,
        lockout_duration_secs: 900,
        mfa_issuer: "Authkeeper".to_string(),
    }
}

pub struct TestHarness {
    pub service: AuthService,
    pub users: Arc<MemoryUserStore>,
    pub sessions: Arc<MemorySessionStore>,
    pub refresh_tokens: Arc<MemoryRefreshTokenStore>,
    pub pending: Arc<MemoryPendingTwoFactorStore>,
    pub recovery_codes: Arc<MemoryRecoveryCodeStore>,
    pub events: Arc<MemoryEventPublisher>,
    pub hasher: Arc<CountingHasher>,
    pub totp: Arc<StaticTotpVerifier>,
    pub encryptor: Arc<AesGcmSecretEncryptor>,
}

pub fn harness() -> TestHarness {
    harness_with(test_config())
}

pub fn harness_with(config: Config) -> TestHarness {
    harness_with_token_store(config, |tokens, _sessions| tokens as Arc<dyn RefreshTokenStore>)
}

/// Builds a harness whose token store is wrapped by the caller, so suites
/// can interpose behavior between the engine and the backing store.
pub fn harness_with_token_store<F>(config: Config, wrap: F) -> TestHarness
where
    F: FnOnce(
        Arc<MemoryRefreshTokenStore>,
        Arc<MemorySessionStore>,
    ) -> Arc<dyn RefreshTokenStore>,
{
    let users = Arc::new(MemoryUserStore::new());
    let sessions = Arc::new(MemorySessionStore::new());
    let refresh_tokens = Arc::new(MemoryRefreshTokenStore::new());
    let pending = Arc::new(MemoryPendingTwoFactorStore::new());
    let recovery_codes = Arc::new(MemoryRecoveryCodeStore::new());
    let events = Arc::new(MemoryEventPublisher::new());
    let hasher = Arc::new(CountingHasher::default());
    let totp = Arc::new(StaticTotpVerifier::default());
    let encryptor = Arc::new(AesGcmSecretEncryptor::from_config(&config));
    let lockout = Arc::new(InMemoryAccountLockout::new(
        config.lockout_threshold,
        config.lockout_window_secs,
        config.lockout_duration_secs,
    ));

    let deps = AuthServiceDeps {
        users: users.clone(),
        sessions: sessions.clone(),
        refresh_tokens: wrap(refresh_tokens.clone(), sessions.clone()),
        pending_two_factor: pending.clone(),
        recovery_codes: recovery_codes.clone(),
        lockout,
        hasher: hasher.clone(),
        secret_encryptor: encryptor.clone(),
        totp: totp.clone(),
        token_issuer: Arc::new(JwtAccessTokenIssuer::new(&config.jwt_secret)),
        events: events.clone(),
    };
    let service = AuthService::new(config, deps).expect("auth service");

    TestHarness {
        service,
        users,
        sessions,
        refresh_tokens,
        pending,
        recovery_codes,
        events,
        hasher,
        totp,
        encryptor,
    }
}

impl TestHarness {
    pub fn add_user(&self, id: &str, email: &str, password: &str) -> User {
        let user = User {
            id: id.to_string(),
            email: email.to_string(),
            password_hash: self.hasher.hash(password).expect("hash"),
            roles: vec!["member".to_string()],
            two_factor_enabled: false,
            two_factor_secret: None,
        };
        self.users.insert(user.clone());
        user
    }

    pub fn add_two_factor_user(&self, id: &str, email: &str, password: &str) -> User {
        let mut user = self.add_user(id, email, password);
        user.two_factor_secret = Some(
            self.encryptor
                .encrypt("JBSWY3DPEHPK3PXP")
                .expect("encrypt secret"),
        );
        user.two_factor_enabled = true;
        self.users.insert(user.clone());
        user
    }
}

pub fn meta() -> ClientMeta {
    ClientMeta::new("203.0.113.7", "integration-suite/1.0")
}

pub fn expect_authenticated(outcome: SignInOutcome) -> AuthenticatedSession {
    match outcome {
        SignInOutcome::Authenticated(authenticated) => *authenticated,
        SignInOutcome::TwoFactorRequired { .. } => {
            panic!("expected full authentication, got a two-factor challenge")
        }
    }
}

pub fn expect_pending(outcome: SignInOutcome) -> String {
    match outcome {
        SignInOutcome::TwoFactorRequired { pending_id } => pending_id,
        SignInOutcome::Authenticated(_) => {
            panic!("expected a two-factor challenge, got full authentication")
        }
    }
}
