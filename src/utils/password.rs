use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::AuthError;

/// Password hashing seam. The sign-in orchestrator also runs `verify`
/// against a precomputed dummy hash when the user does not exist, so
/// implementations must take the same time for a miss as for a mismatch.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, plain: &str) -> Result<String, AuthError>;
    fn verify(&self, hash: &str, plain: &str) -> Result<bool, AuthError>;
}

#[derive(Debug, Default)]
pub struct Argon2CredentialHasher;

impl CredentialHasher for Argon2CredentialHasher {
    fn hash(&self, plain: &str) -> Result<String, AuthError> {
        hash_password(plain).map_err(AuthError::Internal)
    }

    fn verify(&self, hash: &str, plain: &str) -> Result<bool, AuthError> {
        verify_password(plain, hash).map_err(AuthError::Internal)
    }
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    Ok(password_hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("Invalid password hash: {}", e))?;

    let argon2 = Argon2::default();
    let result = argon2.verify_password(password.as_bytes(), &parsed_hash);

    match result {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification error: {}", e)),
    }
}
