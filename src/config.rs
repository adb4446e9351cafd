use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    /// Lifetime of issued access tokens, in seconds.
    pub access_token_ttl_secs: u64,
    /// Lifetime of a standard session, in seconds.
    pub session_ttl_secs: u64,
    /// Lifetime of a remember-me session, in seconds.
    pub session_remember_ttl_secs: u64,
    /// Lifetime of refresh tokens, in seconds.
    pub refresh_token_ttl_secs: u64,
    /// Reuse tolerance after a refresh token has been rotated, in seconds.
    pub refresh_grace_window_secs: u64,
    /// Lifetime of a pending two-factor record, in seconds.
    pub pending_two_factor_ttl_secs: u64,
    /// Maximum session age for sudo-mode operations, in seconds.
    pub sudo_mode_window_secs: u64,
    /// Failed sign-in attempts before an account locks.
    pub lockout_threshold: u32,
    /// Window over which failed attempts accumulate, in seconds.
    pub lockout_window_secs: u64,
    /// How long a locked account stays locked, in seconds.
    pub lockout_duration_secs: u64,
    /// Issuer label embedded in otpauth provisioning URIs.
    pub mfa_issuer: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/authkeeper".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "your-secret-key-change-this-in-production".to_string());
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "authkeeper".to_string());
        let jwt_audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authkeeper-api".to_string());

        Ok(Config {
            database_url,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            access_token_ttl_secs: env_u64("ACCESS_TOKEN_TTL_SECS", 900),
            session_ttl_secs: env_u64("SESSION_TTL_SECS", 900),
            session_remember_ttl_secs: env_u64("SESSION_REMEMBER_TTL_SECS", 2_592_000),
            refresh_token_ttl_secs: env_u64("REFRESH_TOKEN_TTL_SECS", 2_592_000),
            refresh_grace_window_secs: env_u64("REFRESH_GRACE_WINDOW_SECS", 60),
            pending_two_factor_ttl_secs: env_u64("PENDING_TWO_FACTOR_TTL_SECS", 300),
            sudo_mode_window_secs: env_u64("SUDO_MODE_WINDOW_SECS", 300),
            lockout_threshold: env_u64("LOCKOUT_THRESHOLD", 5) as u32,
            lockout_window_secs: env_u64("LOCKOUT_WINDOW_SECS", 900),
            lockout_duration_secs: env_u64("LOCKOUT_DURATION_SECS", 900),
            mfa_issuer: env::var("MFA_ISSUER").unwrap_or_else(|_| "Authkeeper".to_string()),
        })
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
