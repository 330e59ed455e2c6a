//! JWT access-token codec (HS256).
//!
//! Issues self-contained signed tokens carrying `{sub, user_id, jti, iat,
//! exp}` and offers two read paths: [`verify_access_token`] enforces
//! signature *and* expiry (the request gate), while [`decode_access_token`]
//! checks the signature only — logout and account deletion need to read
//! claims out of tokens that may already be past expiry.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::AccessClaims;

/// Minimum HS256 signing-key length in bytes.
pub const MIN_KEY_BYTES: usize = 32;

/// Validate the signing key at startup. Anything shorter than 32 bytes is a
/// fatal configuration error; the process must refuse to start.
pub fn validate_signing_key(key: &[u8]) -> Result<(), AuthError> {
    if key.len() < MIN_KEY_BYTES {
        return Err(AuthError::Config(format!(
            "JWT signing key must be at least {MIN_KEY_BYTES} bytes (got {})",
            key.len()
        )));
    }
    Ok(())
}

/// Generate a signed access token with a fresh `jti` and the given lifetime.
pub fn issue_access_token(
    user_id: i64,
    email: &str,
    ttl_secs: i64,
    key: &[u8],
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: email.to_string(),
        user_id,
        jti: Uuid::new_v4(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(ttl_secs)).timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(key))
        .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
}

/// Verify a token's signature and expiry, returning the claims on success.
///
/// Malformed token, bad signature, unsupported algorithm, and expiry all
/// collapse into one `Unauthorized`; callers cannot tell which check failed.
pub fn verify_access_token(token: &str, key: &[u8]) -> Result<AccessClaims, AuthError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<AccessClaims>(token, &DecodingKey::from_secret(key), &validation)
        .map(|data| data.claims)
        .map_err(|_| AuthError::Unauthorized("Invalid token".into()))
}

/// Read claims without enforcing expiry. The signature is still checked.
pub fn decode_access_token(token: &str, key: &[u8]) -> Result<AccessClaims, AuthError> {
    let mut validation = Validation::default();
    validation.validate_exp = false;
    decode::<AccessClaims>(token, &DecodingKey::from_secret(key), &validation)
        .map(|data| data.claims)
        .map_err(|_| AuthError::Unauthorized("Invalid token".into()))
}
