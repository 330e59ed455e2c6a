//! Rotating refresh-token store.
//!
//! One active refresh token per user: issuing a new token first revokes all
//! prior non-revoked ones, and redemption locks the row so two concurrent
//! refresh calls replaying the same value cannot both win. Token values are
//! opaque random strings, stored as SHA-256 hashes.

use chrono::{Duration, Utc};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Postgres, Transaction};

use super::AuthError;
use crate::models::auth::RefreshTokenRecord;

/// Length of the opaque refresh-token value (alphanumeric chars).
const TOKEN_VALUE_LEN: usize = 64;

/// Generate a cryptographically random refresh-token value.
fn generate_token_value() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_VALUE_LEN)
        .map(char::from)
        .collect()
}

/// SHA-256 hash a token value for storage and lookup.
fn hash_token_value(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Issue a new refresh token for a user, revoking all prior non-revoked
/// tokens first (single rotation authority per user). Returns the plaintext
/// value; only its hash is persisted.
pub async fn issue(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    ttl_secs: i64,
) -> Result<String, AuthError> {
    revoke_all_tx(tx, user_id).await?;

    let value = generate_token_value();
    let expiry = Utc::now() + Duration::seconds(ttl_secs);

    sqlx::query(
        "INSERT INTO refresh_tokens (token_hash, user_id, expiry_date) VALUES ($1, $2, $3)",
    )
    .bind(hash_token_value(&value))
    .bind(user_id)
    .bind(expiry)
    .execute(&mut **tx)
    .await?;

    Ok(value)
}

/// Look up a non-revoked record by token value, locking the row for the
/// remainder of the transaction.
///
/// The caller is expected to revoke the returned record and issue a fresh
/// one (rotation-on-use); the row lock guarantees a concurrent redemption
/// of the same value observes the revocation and fails. An expired record
/// is deleted on sight.
pub async fn redeem_for_update(
    tx: &mut Transaction<'_, Postgres>,
    value: &str,
) -> Result<RefreshTokenRecord, AuthError> {
    let row = sqlx::query_as::<
        _,
        (
            i64,
            i64,
            chrono::DateTime<Utc>,
            bool,
            chrono::DateTime<Utc>,
        ),
    >(
        "SELECT id, user_id, expiry_date, revoked, created_at \
         FROM refresh_tokens \
         WHERE token_hash = $1 AND revoked = FALSE \
         FOR UPDATE",
    )
    .bind(hash_token_value(value))
    .fetch_optional(&mut **tx)
    .await?;

    let Some((id, user_id, expiry_date, revoked, created_at)) = row else {
        return Err(AuthError::Unauthorized("Invalid refresh token".into()));
    };

    let record = RefreshTokenRecord {
        id,
        user_id,
        expiry_date,
        revoked,
        created_at,
    };

    if record.is_expired(Utc::now()) {
        sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(record.id)
            .execute(&mut **tx)
            .await?;
        return Err(AuthError::Unauthorized("Refresh token expired".into()));
    }

    Ok(record)
}

/// Revoke a single refresh token by id.
pub async fn revoke(tx: &mut Transaction<'_, Postgres>, token_id: i64) -> Result<(), AuthError> {
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = $1")
        .bind(token_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Revoke all of a user's refresh tokens. Idempotent.
pub async fn revoke_all(pool: &PgPool, user_id: i64) -> Result<(), AuthError> {
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

async fn revoke_all_tx(tx: &mut Transaction<'_, Postgres>, user_id: i64) -> Result<(), AuthError> {
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Hard-delete all of a user's refresh tokens. Account deletion only.
pub async fn delete_all(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
) -> Result<(), AuthError> {
    sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Delete records past their expiry. Periodic hygiene, not correctness:
/// expired records are already rejected (and dropped) at redemption.
pub async fn delete_expired(pool: &PgPool) -> Result<u64, AuthError> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE expiry_date < now()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
