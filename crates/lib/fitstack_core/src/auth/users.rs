//! User directory queries.

use sqlx::{PgPool, Postgres, Transaction};

use super::AuthError;
use crate::models::auth::User;

type UserRow = (
    i64,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

const USER_COLUMNS: &str = "id, email, first_name, last_name, password_hash, google_id";

fn row_to_user(row: UserRow) -> User {
    let (id, email, first_name, last_name, password_hash, google_id) = row;
    User {
        id,
        email,
        first_name,
        last_name,
        password_hash,
        google_id,
    }
}

/// Fetch a user by email.
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AuthError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(row_to_user))
}

/// Fetch a user by id.
pub async fn find_by_id(pool: &PgPool, user_id: i64) -> Result<Option<User>, AuthError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(row_to_user))
}

/// Fetch a user by identity-provider subject id.
pub async fn find_by_google_id(pool: &PgPool, google_id: &str) -> Result<Option<User>, AuthError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE google_id = $1"
    ))
    .bind(google_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(row_to_user))
}

/// Check whether an email is already registered.
pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool, AuthError> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

/// Create a password-based user, returning the new row.
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<User, AuthError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (email, password_hash, first_name, last_name) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(email)
    .bind(password_hash)
    .bind(first_name)
    .bind(last_name)
    .fetch_one(pool)
    .await?;
    Ok(row_to_user(row))
}

/// Create an OAuth-based user. No password hash is stored, so password
/// login for this account can never succeed.
pub async fn create_oauth_user(
    pool: &PgPool,
    email: &str,
    google_id: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<User, AuthError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (email, google_id, first_name, last_name) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(email)
    .bind(google_id)
    .bind(first_name)
    .bind(last_name)
    .fetch_one(pool)
    .await?;
    Ok(row_to_user(row))
}

/// Link an identity-provider subject id to an existing password account,
/// backfilling names only where they are missing.
pub async fn link_google_id(
    pool: &PgPool,
    user_id: i64,
    google_id: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<User, AuthError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users \
         SET google_id = $2, \
             first_name = COALESCE(first_name, $3), \
             last_name = COALESCE(last_name, $4) \
         WHERE id = $1 \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(google_id)
    .bind(first_name)
    .bind(last_name)
    .fetch_one(pool)
    .await?;
    Ok(row_to_user(row))
}

/// Delete the user row. Account deletion only; all dependent rows must
/// already be gone.
pub async fn delete_user(tx: &mut Transaction<'_, Postgres>, user_id: i64) -> Result<(), AuthError> {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
