//! Session orchestrator.
//!
//! Composes the token codec, refresh-token store, blacklist, and rate
//! limiter into the register / login / OAuth-login / refresh / logout /
//! account-deletion flows. This is the only place with cross-cutting
//! session policy; the stores themselves stay mechanism-only.

use tracing::{info, warn};

use fitstack_core::auth::rate_limit::EndpointClass;
use fitstack_core::auth::{AuthError, jwt, password, refresh, users};
use fitstack_core::models::auth::User;
use fitstack_core::purge;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{
    AuthResponse, GoogleAuthRequest, LoginRequest, RegisterRequest, UserSummary,
};

/// Wrong email and wrong password must be indistinguishable.
const INVALID_CREDENTIALS: &str = "Invalid email or password";

fn ensure_not_blocked(state: &AppState, address: &str, class: EndpointClass) -> AppResult<()> {
    if state.rate_limiter.is_blocked(address, class) {
        let retry_after_secs = state.rate_limiter.remaining_lockout_secs(address, class);
        warn!(address, class = ?class, retry_after_secs, "request blocked by rate limiter");
        return Err(AppError::RateLimited { retry_after_secs });
    }
    Ok(())
}

fn build_auth_response(
    user: &User,
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    refresh_token_expires_in: i64,
) -> AuthResponse {
    AuthResponse {
        token: access_token,
        token_type: "Bearer".to_string(),
        expires_in,
        refresh_token,
        refresh_token_expires_in,
        user: UserSummary {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_oauth_user: user.is_oauth_user(),
        },
    }
}

/// Issue an access token plus a rotated refresh token for a user.
async fn open_session(
    state: &AppState,
    user: &User,
    access_ttl_secs: i64,
) -> AppResult<AuthResponse> {
    let access_token = jwt::issue_access_token(
        user.id,
        &user.email,
        access_ttl_secs,
        state.config.jwt_secret.as_bytes(),
    )?;

    let mut tx = state.pool.begin().await.map_err(AuthError::from)?;
    let refresh_token = refresh::issue(&mut tx, user.id, state.config.refresh_ttl_secs).await?;
    tx.commit().await.map_err(AuthError::from)?;

    Ok(build_auth_response(
        user,
        access_token,
        refresh_token,
        access_ttl_secs,
        state.config.refresh_ttl_secs,
    ))
}

/// Register a new account and open a session for it.
pub async fn register(
    state: &AppState,
    request: &RegisterRequest,
    address: &str,
) -> AppResult<AuthResponse> {
    ensure_not_blocked(state, address, EndpointClass::Register)?;

    if users::email_exists(&state.pool, &request.email).await? {
        state
            .rate_limiter
            .record_failure(address, EndpointClass::Register);
        warn!(email = %request.email, address, "registration attempt with existing email");
        return Err(AppError::BadRequest("Email already registered".into()));
    }

    let password_hash = password::hash_password(&request.password)?;
    let user = users::create_user(
        &state.pool,
        &request.email,
        &password_hash,
        request.first_name.as_deref(),
        request.last_name.as_deref(),
    )
    .await?;
    info!(user_id = user.id, email = %user.email, address, "new user registered");

    let response = open_session(state, &user, state.config.access_ttl_secs).await?;
    state
        .rate_limiter
        .record_success(address, EndpointClass::Register);
    Ok(response)
}

/// Authenticate with email + password.
pub async fn login(
    state: &AppState,
    request: &LoginRequest,
    address: &str,
) -> AppResult<AuthResponse> {
    ensure_not_blocked(state, address, EndpointClass::Login)?;

    let user = match users::find_by_email(&state.pool, &request.email).await? {
        Some(user) => user,
        None => {
            state
                .rate_limiter
                .record_failure(address, EndpointClass::Login);
            warn!(address, "failed login attempt: unknown email");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        }
    };

    // Absent hash (OAuth account) verifies false through the same path, so
    // the error below stays identical for every failure mode.
    if !password::verify_against(&request.password, user.password_hash.as_deref())? {
        state
            .rate_limiter
            .record_failure(address, EndpointClass::Login);
        warn!(user_id = user.id, address, "failed login attempt: wrong password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    state
        .rate_limiter
        .record_success(address, EndpointClass::Login);
    info!(
        user_id = user.id,
        address,
        remember_me = request.remember_me,
        "successful login"
    );

    let access_ttl = if request.remember_me {
        state.config.remember_me_ttl_secs
    } else {
        state.config.access_ttl_secs
    };
    open_session(state, &user, access_ttl).await
}

/// Authenticate with a Google-issued token.
///
/// The provider token is verified against the tokeninfo endpoint before any
/// account is touched; verification failures are indistinguishable to the
/// caller.
pub async fn login_with_google(
    state: &AppState,
    request: &GoogleAuthRequest,
) -> AppResult<AuthResponse> {
    state
        .token_verifier
        .verify(&request.id_token, &request.email)
        .await?;

    let user = find_or_create_google_user(state, request).await?;
    info!(user_id = user.id, "google oauth login");

    open_session(state, &user, state.config.access_ttl_secs).await
}

async fn find_or_create_google_user(
    state: &AppState,
    request: &GoogleAuthRequest,
) -> AppResult<User> {
    if let Some(user) = users::find_by_google_id(&state.pool, &request.google_id).await? {
        return Ok(user);
    }

    // An email that registered with a password first gets the Google
    // identity linked onto the existing account.
    if let Some(user) = users::find_by_email(&state.pool, &request.email).await? {
        info!(user_id = user.id, "linking google account to existing user");
        let user = users::link_google_id(
            &state.pool,
            user.id,
            &request.google_id,
            request.first_name.as_deref(),
            request.last_name.as_deref(),
        )
        .await?;
        return Ok(user);
    }

    let user = users::create_oauth_user(
        &state.pool,
        &request.email,
        &request.google_id,
        request.first_name.as_deref(),
        request.last_name.as_deref(),
    )
    .await?;
    info!(user_id = user.id, "created user from google oauth");
    Ok(user)
}

/// Rotate a refresh token: the redeemed value is dead afterwards even if
/// replayed, enforced by the row lock inside the transaction.
pub async fn refresh(state: &AppState, token_value: &str, address: &str) -> AppResult<AuthResponse> {
    ensure_not_blocked(state, address, EndpointClass::Refresh)?;

    let mut tx = state.pool.begin().await.map_err(AuthError::from)?;

    let record = match refresh::redeem_for_update(&mut tx, token_value).await {
        Ok(record) => record,
        Err(e @ AuthError::Unauthorized(_)) => {
            // Commit so an opportunistic delete of an expired row sticks.
            let _ = tx.commit().await;
            state
                .rate_limiter
                .record_failure(address, EndpointClass::Refresh);
            warn!(address, "invalid refresh token");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    let user = users::find_by_id(&state.pool, record.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    refresh::revoke(&mut tx, record.id).await?;
    let new_refresh = refresh::issue(&mut tx, user.id, state.config.refresh_ttl_secs).await?;
    tx.commit().await.map_err(AuthError::from)?;

    let access_token = jwt::issue_access_token(
        user.id,
        &user.email,
        state.config.access_ttl_secs,
        state.config.jwt_secret.as_bytes(),
    )?;

    state
        .rate_limiter
        .record_success(address, EndpointClass::Refresh);
    info!(user_id = user.id, address, "token refreshed");

    Ok(build_auth_response(
        &user,
        access_token,
        new_refresh,
        state.config.access_ttl_secs,
        state.config.refresh_ttl_secs,
    ))
}

/// Close a session: blacklist the access token through its natural expiry
/// and revoke the user's refresh tokens.
///
/// Best-effort by contract: the token may already be garbage and the
/// store may be down; the caller still gets a success.
pub async fn logout(state: &AppState, access_token: &str) {
    let claims = match jwt::decode_access_token(access_token, state.config.jwt_secret.as_bytes()) {
        Ok(claims) => claims,
        Err(_) => {
            warn!("logout with undecodable token");
            return;
        }
    };

    state.blacklist.add(claims.jti, claims.expires_at());

    match refresh::revoke_all(&state.pool, claims.user_id).await {
        Ok(()) => info!(user_id = claims.user_id, "user logged out"),
        Err(e) => warn!(
            user_id = claims.user_id,
            error = %e,
            "failed to revoke refresh tokens during logout"
        ),
    }
}

/// Delete the account and every row that belongs to it.
///
/// No password re-confirmation: the client-side confirmation phrase is the
/// contract, which also covers OAuth accounts that have no password.
pub async fn delete_account(
    state: &AppState,
    user_id: i64,
    current_token: Option<&str>,
) -> AppResult<()> {
    let user = users::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("User not found".into()))?;

    // Best-effort: deletion proceeds even if the token cannot be read.
    if let Some(token) = current_token {
        match jwt::decode_access_token(token, state.config.jwt_secret.as_bytes()) {
            Ok(claims) => state.blacklist.add(claims.jti, claims.expires_at()),
            Err(_) => warn!(user_id, "could not blacklist token during account deletion"),
        }
    }

    let mut tx = state.pool.begin().await.map_err(AuthError::from)?;
    purge::delete_all_user_data(&mut tx, user_id).await?;
    refresh::delete_all(&mut tx, user_id).await?;
    users::delete_user(&mut tx, user_id).await?;
    tx.commit().await.map_err(AuthError::from)?;

    info!(user_id, email = %user.email, "account deleted");
    Ok(())
}
