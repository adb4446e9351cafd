use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::types::random_id;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    /// Unique token id for correlation and revocation checks.
    pub jti: String,
    /// Session the token was minted for.
    pub sid: String,
    pub roles: Vec<String>,
}

impl Claims {
    pub fn new(
        user_id: &str,
        session_id: &str,
        roles: &[String],
        issuer: &str,
        audience: &str,
        ttl_secs: u64,
    ) -> Self {
        let now = Utc::now();
        let exp = now + Duration::seconds(ttl_secs as i64);

        Self {
            sub: user_id.to_string(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: random_id(),
            sid: session_id.to_string(),
            roles: roles.to_vec(),
        }
    }
}

/// Signed access-token issuance seam.
pub trait AccessTokenIssuer: Send + Sync {
    fn generate(&self, claims: &Claims) -> Result<String, AuthError>;
}

#[derive(Debug, Clone)]
pub struct JwtAccessTokenIssuer {
    secret: String,
}

impl JwtAccessTokenIssuer {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
        }
    }
}

impl AccessTokenIssuer for JwtAccessTokenIssuer {
    fn generate(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|e| AuthError::Internal(anyhow::anyhow!("Failed to sign access token: {}", e)))
    }
}

/// Decodes and validates an access token, checking signature, expiry,
/// issuer, and audience. Consumed by the HTTP layer's auth middleware.
pub fn verify_access_token(
    token: &str,
    secret: &str,
    issuer: &str,
    audience: &str,
) -> anyhow::Result<Claims> {
    let mut validation = Validation::default();
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )?;

    Ok(token_data.claims)
}
