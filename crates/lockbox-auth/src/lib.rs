//! Credential handling: password verifiers and bearer tokens.
//!
//! Passwords are hashed with argon2id into self-describing PHC strings; the
//! verifier alone cannot recover the password. Tokens are HS256-signed JWTs
//! with a process-wide secret. The signing method is pinned: a token
//! presenting any other `alg` fails validation regardless of its signature.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

/// Token lifetime.
const TOKEN_TTL_HOURS: i64 = 24;
/// How long past expiry a token may still be exchanged for a fresh one.
const REFRESH_GRACE_HOURS: i64 = 1;
const ISSUER: &str = "lockbox";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hash failure: {0}")]
    Hash(String),
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("token too stale to refresh")]
    TokenTooStale,
}

/// JWT claims carried by every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Principal identifier.
    pub sub: Uuid,
    pub username: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_default()
    }
}

/// Process-wide credential service. The signing secret and hash parameters
/// are immutable after construction.
#[derive(Clone)]
pub struct CredentialService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl CredentialService {
    pub fn new(jwt_secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret),
            decoding_key: DecodingKey::from_secret(jwt_secret),
        }
    }

    // ─────────────────────────────────── Passwords ────────────────────────────────────────

    /// Hash a password into a PHC string with a per-input random salt.
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hash(e.to_string()))
    }

    /// Check a password against a stored verifier. A malformed verifier or
    /// unknown parameters report a mismatch, not an error.
    pub fn verify_password(&self, password: &str, verifier: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(verifier) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    // ───────────────────────────────────── Tokens ─────────────────────────────────────────

    /// Issue a signed token for the principal, valid for 24 hours.
    pub fn issue_token(
        &self,
        user_id: Uuid,
        username: &str,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(TOKEN_TTL_HOURS);
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: ISSUER.to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AuthError::InvalidToken)?;
        Ok((token, expires_at))
    }

    /// Verify signature and temporal claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &validation(true))
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?;
        Ok(data.claims)
    }

    /// Exchange a token for a fresh one. This is the one place expiry is not
    /// enforced: a token expired within the last hour is still accepted; any
    /// staler and the principal must log in again.
    pub fn refresh_token(&self, token: &str) -> Result<(String, DateTime<Utc>), AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &validation(false))
            .map_err(|_| AuthError::InvalidToken)?;

        let age = Utc::now().timestamp() - data.claims.exp;
        if age > REFRESH_GRACE_HOURS * 3600 {
            return Err(AuthError::TokenTooStale);
        }

        self.issue_token(data.claims.sub, &data.claims.username)
    }
}

fn validation(validate_exp: bool) -> Validation {
    // Pinned to HS256: tokens carrying any other alg are rejected outright.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = validate_exp;
    validation.validate_nbf = true;
    validation.leeway = 0;
    validation
}
