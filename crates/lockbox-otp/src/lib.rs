//! Time-based one-time passwords (RFC 6238 construction: HMAC-SHA1, six
//! digits, 30-second steps from the Unix epoch) plus enrollment URIs and
//! backup codes. The whole module is stateless; secrets live client-side.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::Sha1;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

/// TOTP step length in seconds.
pub const STEP_SECONDS: i64 = 30;
/// Digits in a derived code.
pub const DIGITS: u32 = 6;
/// Shared secret size: 160 bits, matching the HMAC-SHA1 block it keys.
const SECRET_BYTES: usize = 20;
/// Backup codes default to ten per enrollment.
pub const DEFAULT_BACKUP_CODES: usize = 10;
const BACKUP_CODE_CHARS: usize = 10;

const BASE32: base32::Alphabet = base32::Alphabet::Rfc4648 { padding: false };

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("malformed shared secret")]
    SecretMalformed,
    #[error("code derivation failed: {0}")]
    Derivation(String),
    #[error("randomness unavailable: {0}")]
    Rng(String),
}

/// Generate a fresh 160-bit shared secret, base32-encoded without padding.
pub fn generate_secret() -> Result<String, OtpError> {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| OtpError::Rng(e.to_string()))?;
    Ok(base32::encode(BASE32, &bytes))
}

/// Build the `otpauth://` URI that authenticator apps consume. Issuer and
/// account name are percent-escaped; the label keeps its raw colon.
pub fn enrollment_uri(secret: &str, issuer: &str, account_name: &str) -> String {
    let issuer = utf8_percent_encode(issuer, NON_ALPHANUMERIC);
    let account = utf8_percent_encode(account_name, NON_ALPHANUMERIC);
    format!(
        "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={DIGITS}&period={STEP_SECONDS}"
    )
}

/// Derive the six-digit code for the step containing `at`.
pub fn derive_code(secret: &str, at: DateTime<Utc>) -> Result<String, OtpError> {
    derive_code_at(secret, at.timestamp())
}

fn derive_code_at(secret: &str, unix_secs: i64) -> Result<String, OtpError> {
    let key = decode_secret(secret)?;
    let counter = (unix_secs / STEP_SECONDS) as u64;

    let mut mac = HmacSha1::new_from_slice(&key)
        .map_err(|e| OtpError::Derivation(e.to_string()))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation per RFC 4226 §5.3.
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let bin = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    Ok(format!("{:06}", bin % 10u32.pow(DIGITS)))
}

/// Check a code against the current step. Any failure, including a secret
/// that does not parse, reports a plain mismatch.
pub fn verify_code(secret: &str, code: &str) -> bool {
    let Ok(expected) = derive_code(secret, Utc::now()) else {
        return false;
    };
    expected.as_bytes().ct_eq(code.as_bytes()).into()
}

/// Seconds left in the current step, in [1, 30].
pub fn seconds_until_next_step() -> i64 {
    STEP_SECONDS - (Utc::now().timestamp().rem_euclid(STEP_SECONDS))
}

/// Generate `n` backup codes (0 means the default of ten), each ten base32
/// characters as two dash-joined groups of five.
pub fn generate_backup_codes(n: usize) -> Result<Vec<String>, OtpError> {
    let n = if n == 0 { DEFAULT_BACKUP_CODES } else { n };
    let mut codes = Vec::with_capacity(n);
    for _ in 0..n {
        // 7 random bytes encode to 12 base32 chars; the code keeps 10.
        let mut bytes = [0u8; 7];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| OtpError::Rng(e.to_string()))?;
        let encoded = base32::encode(BASE32, &bytes);
        let code = &encoded[..BACKUP_CODE_CHARS];
        codes.push(format!("{}-{}", &code[..5], &code[5..]));
    }
    Ok(codes)
}

fn decode_secret(secret: &str) -> Result<Vec<u8>, OtpError> {
    // Tolerate the representations authenticator apps emit: lowercase,
    // spaces, trailing padding.
    let normalized: String = secret
        .trim()
        .trim_end_matches('=')
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if normalized.is_empty() {
        return Err(OtpError::SecretMalformed);
    }
    base32::decode(BASE32, &normalized).ok_or(OtpError::SecretMalformed)
}
