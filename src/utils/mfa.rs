use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Result};
use base32::Alphabet::RFC4648;
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use totp_rs::{Algorithm, TOTP};

use crate::config::Config;
use crate::error::AuthError;

const SECRET_BYTE_LENGTH: usize = 20;
const CODE_DIGITS: usize = 6;
const STEP_SECONDS: u64 = 30;
const ALLOWED_SKEW: u8 = 1;
const NONCE_LENGTH: usize = 12;
const ENCRYPTED_PREFIX: &str = "enc:v1";

/// Verifies a submitted 6-digit code against a decrypted shared secret.
pub trait TotpVerifier: Send + Sync {
    fn verify(&self, secret: &str, code: &str) -> Result<bool, AuthError>;
}

#[derive(Debug, Default)]
pub struct TotpRsVerifier;

impl TotpVerifier for TotpRsVerifier {
    fn verify(&self, secret: &str, code: &str) -> Result<bool, AuthError> {
        verify_totp_code(secret, code).map_err(AuthError::Internal)
    }
}

/// Encrypts TOTP secrets at rest.
pub trait TwoFactorSecretEncryptor: Send + Sync {
    fn encrypt(&self, secret: &str) -> Result<String, AuthError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, AuthError>;
}

/// AES-256-GCM encryptor with a key derived from service configuration.
pub struct AesGcmSecretEncryptor {
    key: [u8; 32],
}

impl AesGcmSecretEncryptor {
    pub fn from_config(config: &Config) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(config.jwt_secret.as_bytes());
        hasher.update(b"|");
        hasher.update(config.mfa_issuer.as_bytes());
        let digest = hasher.finalize();
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }
}

impl TwoFactorSecretEncryptor for AesGcmSecretEncryptor {
    fn encrypt(&self, secret: &str) -> Result<String, AuthError> {
        protect_totp_secret(secret, &self.key).map_err(AuthError::Internal)
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, AuthError> {
        recover_totp_secret(ciphertext, &self.key).map_err(AuthError::Internal)
    }
}

/// Generates a random base32-encoded secret suitable for RFC6238 TOTP.
pub fn generate_totp_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTE_LENGTH];
    OsRng.fill_bytes(&mut bytes);
    base32::encode(RFC4648 { padding: false }, &bytes)
}

/// Produces an `otpauth://` URI that OTP clients can import.
pub fn generate_otpauth_uri(issuer: &str, account_name: &str, secret: &str) -> Result<String> {
    if issuer.contains(':') {
        return Err(anyhow!("Issuer must not contain ':'"));
    }
    let sanitized_account = account_name.trim();
    if sanitized_account.contains(':') {
        return Err(anyhow!("Account name must not contain ':'"));
    }
    let totp = build_totp_with_labels(secret, Some(issuer), sanitized_account)?;
    Ok(totp.get_url())
}

/// Validates the submitted TOTP code against the stored secret.
pub fn verify_totp_code(secret: &str, code: &str) -> Result<bool> {
    let sanitized_code = code.trim();
    if sanitized_code.len() != CODE_DIGITS || !sanitized_code.chars().all(|c| c.is_ascii_digit()) {
        return Ok(false);
    }
    let totp = build_totp(secret)?;
    totp.check_current(sanitized_code)
        .map_err(|e| anyhow!("Failed to verify TOTP code: {}", e))
}

fn protect_totp_secret(secret: &str, key: &[u8; 32]) -> Result<String> {
    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| anyhow!("Invalid encryption key"))?;
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, secret.as_bytes())
        .map_err(|_| anyhow!("Failed to encrypt TOTP secret"))?;

    Ok(format!(
        "{}:{}:{}",
        ENCRYPTED_PREFIX,
        STANDARD_NO_PAD.encode(nonce_bytes),
        STANDARD_NO_PAD.encode(ciphertext)
    ))
}

fn recover_totp_secret(stored: &str, key: &[u8; 32]) -> Result<String> {
    let mut parts = stored.splitn(3, ':');
    let prefix = parts.next().unwrap_or_default();
    let version = parts.next().unwrap_or_default();
    let remainder = parts.next().unwrap_or_default();

    if prefix != "enc" || version != "v1" || remainder.is_empty() {
        return Err(anyhow!("Unrecognized encrypted secret format"));
    }

    let mut payload = remainder.splitn(2, ':');
    let nonce_part = payload.next().unwrap_or_default();
    let cipher_part = payload.next().unwrap_or_default();

    if nonce_part.is_empty() || cipher_part.is_empty() {
        return Err(anyhow!("Invalid encrypted secret format"));
    }

    let nonce_bytes = STANDARD_NO_PAD
        .decode(nonce_part)
        .map_err(|_| anyhow!("Invalid nonce encoding"))?;
    if nonce_bytes.len() != NONCE_LENGTH {
        return Err(anyhow!("Invalid nonce length"));
    }
    let ciphertext = STANDARD_NO_PAD
        .decode(cipher_part)
        .map_err(|_| anyhow!("Invalid ciphertext encoding"))?;

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| anyhow!("Invalid encryption key"))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| anyhow!("Failed to decrypt TOTP secret"))?;

    String::from_utf8(plaintext).map_err(|_| anyhow!("Invalid UTF-8 in decrypted secret"))
}

fn build_totp(secret: &str) -> Result<TOTP> {
    build_totp_with_labels(secret, None, "")
}

fn build_totp_with_labels(secret: &str, issuer: Option<&str>, account_name: &str) -> Result<TOTP> {
    let secret_bytes = decode_secret(secret)?;
    TOTP::new(
        Algorithm::SHA1,
        CODE_DIGITS,
        ALLOWED_SKEW,
        STEP_SECONDS,
        secret_bytes,
        issuer.map(|value| value.to_string()),
        account_name.to_string(),
    )
    .map_err(|e| anyhow!("Failed to configure TOTP: {}", e))
}

fn decode_secret(secret: &str) -> Result<Vec<u8>> {
    let cleaned = secret.trim().replace(' ', "").to_uppercase();
    base32::decode(RFC4648 { padding: false }, cleaned.as_str())
        .ok_or_else(|| anyhow!("Invalid base32 secret"))
}
