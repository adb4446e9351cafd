use thiserror::Error;

/// Error taxonomy exposed by the engine.
///
/// Messages are deliberately uniform: callers must not be able to tell a
/// missing token from a revoked one, or a wrong password from an unknown
/// email. Internal inconsistencies behind a valid credential (missing
/// session or user rows) are surfaced as `Unauthorized`, never as 500s.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    Unauthorized,
    #[error("account temporarily locked")]
    Locked,
    #[error("access denied")]
    AccessDenied,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Internal(err.into())
    }
}

impl AuthError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthError::Unauthorized)
    }
}
