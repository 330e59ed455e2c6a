//! API server configuration.

use std::time::Duration;

use fitstack_core::auth::AuthError;
use fitstack_core::auth::jwt;
use fitstack_core::auth::rate_limit::{EndpointClass, RateLimitConfig};

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3200").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// JWT signing key (HS256, at least 32 bytes).
    pub jwt_secret: String,
    /// Standard access-token lifetime in seconds.
    pub access_ttl_secs: i64,
    /// Remember-me access-token lifetime in seconds.
    pub remember_me_ttl_secs: i64,
    /// Refresh-token lifetime in seconds.
    pub refresh_ttl_secs: i64,
    /// Registered Google OAuth client id (empty disables OAuth login).
    pub google_client_id: String,
    /// Per-endpoint-class throttling policy.
    pub rate_limits: RateLimitConfig,
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                 | Default                                  |
    /// |--------------------------|------------------------------------------|
    /// | `BIND_ADDR`              | `127.0.0.1:3200`                         |
    /// | `DATABASE_URL`           | `postgres://localhost:5432/fitstack`     |
    /// | `JWT_SECRET`             | required, ≥ 32 bytes (fatal otherwise)   |
    /// | `ACCESS_TOKEN_TTL_SECS`  | 86400 (24 h)                             |
    /// | `REMEMBER_ME_TTL_SECS`   | 2592000 (30 d)                           |
    /// | `REFRESH_TOKEN_TTL_SECS` | 604800 (7 d)                             |
    /// | `GOOGLE_CLIENT_ID`       | empty                                    |
    /// | `<CLASS>_MAX_ATTEMPTS`, `<CLASS>_LOCKOUT_SECS` | policy table       |
    ///
    /// A missing or too-short signing key is a fatal configuration error;
    /// the process must refuse to start.
    pub fn from_env() -> Result<Self, AuthError> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| AuthError::Config("JWT_SECRET must be set".into()))?;
        jwt::validate_signing_key(jwt_secret.as_bytes())?;

        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3200".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/fitstack".into()),
            jwt_secret,
            access_ttl_secs: env_i64("ACCESS_TOKEN_TTL_SECS")?.unwrap_or(86_400),
            remember_me_ttl_secs: env_i64("REMEMBER_ME_TTL_SECS")?.unwrap_or(2_592_000),
            refresh_ttl_secs: env_i64("REFRESH_TOKEN_TTL_SECS")?.unwrap_or(604_800),
            google_client_id: std::env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            rate_limits: rate_limits_from_env()?,
        })
    }
}

/// Build the throttling policy table, applying per-class env overrides on
/// top of the defaults (`LOGIN_MAX_ATTEMPTS`, `LOGIN_LOCKOUT_SECS`, ...).
fn rate_limits_from_env() -> Result<RateLimitConfig, AuthError> {
    let mut config = RateLimitConfig::default();
    let classes = [
        (EndpointClass::Login, "LOGIN"),
        (EndpointClass::Register, "REGISTER"),
        (EndpointClass::Refresh, "REFRESH"),
        (EndpointClass::General, "GENERAL"),
    ];
    for (class, prefix) in classes {
        let mut policy = config.policy(class);
        if let Some(n) = env_i64(&format!("{prefix}_MAX_ATTEMPTS"))? {
            policy.max_attempts = u32::try_from(n)
                .map_err(|_| AuthError::Config(format!("{prefix}_MAX_ATTEMPTS out of range")))?;
        }
        if let Some(n) = env_i64(&format!("{prefix}_LOCKOUT_SECS"))? {
            let secs = u64::try_from(n)
                .map_err(|_| AuthError::Config(format!("{prefix}_LOCKOUT_SECS out of range")))?;
            policy.lockout = Duration::from_secs(secs);
        }
        config.set_policy(class, policy);
    }
    Ok(config)
}

/// Read an optional integer env var; an unparsable value is a configuration
/// error rather than a silent fallback.
fn env_i64(name: &str) -> Result<Option<i64>, AuthError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| AuthError::Config(format!("{name} must be an integer, got {raw:?}"))),
        Err(_) => Ok(None),
    }
}
