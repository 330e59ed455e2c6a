//! Authentication domain models.
//!
//! Internal domain models, distinct from the API request/response DTOs
//! (which carry `#[serde(rename)]` for camelCase etc.).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user row as the auth flows see it.
///
/// `password_hash` is `None` for OAuth-created accounts; password login
/// for those accounts always fails credential verification.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
}

impl User {
    /// Whether this account was created through an identity provider.
    pub fn is_oauth_user(&self) -> bool {
        self.password_hash.is_none()
    }
}

/// Refresh token record stored in the database.
///
/// The opaque token value itself is never stored; only its SHA-256 hash.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub expiry_date: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_date
    }
}

/// JWT claims embedded in access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject — user email (standard JWT `sub` claim).
    pub sub: String,
    /// Numeric user id.
    pub user_id: i64,
    /// Token id, the blacklist key.
    pub jti: Uuid,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

impl AccessClaims {
    /// The token's natural expiry as a timestamp.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
