//! Authentication and session-lifecycle logic.
//!
//! Provides the access-token codec, password hashing, the rotating
//! refresh-token store, the token blacklist, and IP-based rate limiting,
//! shared by `fitstack_api` and the server binary.

pub mod blacklist;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod refresh;
pub mod users;

use thiserror::Error;

/// Authentication errors.
///
/// Credential and token failures are deliberately coarse: callers must not
/// be able to distinguish which check rejected them.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Too many attempts. Try again in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
