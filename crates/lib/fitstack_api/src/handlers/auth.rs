//! Session endpoint handlers.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};

use crate::AppState;
use crate::error::AppResult;
use crate::handlers::client_ip;
use crate::middleware::auth::{AuthenticatedUser, bearer_token};
use crate::models::{
    AuthResponse, GoogleAuthRequest, LoginRequest, MessageResponse, RefreshRequest,
    RegisterRequest,
};
use crate::services::auth;

/// `POST /api/users/register` — create an account and open a session.
pub async fn register_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let address = client_ip(&headers, peer);
    let resp = auth::register(&state, &body, &address).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// `POST /api/users/login` — authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let address = client_ip(&headers, peer);
    let resp = auth::login(&state, &body, &address).await?;
    Ok(Json(resp))
}

/// `POST /api/users/oauth/google` — authenticate with a Google token.
pub async fn google_auth_handler(
    State(state): State<AppState>,
    Json(body): Json<GoogleAuthRequest>,
) -> AppResult<Json<AuthResponse>> {
    let resp = auth::login_with_google(&state, &body).await?;
    Ok(Json(resp))
}

/// `POST /api/users/refresh` — exchange a refresh token for a new pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let address = client_ip(&headers, peer);
    let resp = auth::refresh(&state, &body.refresh_token, &address).await?;
    Ok(Json(resp))
}

/// `POST /api/users/logout` — blacklist the presented access token and
/// revoke the user's refresh tokens. Always succeeds from the caller's
/// perspective, even for garbage tokens.
pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<MessageResponse> {
    if let Some(token) = bearer_token(&headers) {
        auth::logout(&state, token).await;
    }
    Json(MessageResponse {
        message: "Logged out successfully".into(),
    })
}

/// `DELETE /api/users/account` — delete the authenticated user and all of
/// their data. Requires authentication; the confirmation phrase is checked
/// client-side.
pub async fn delete_account_handler(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    headers: HeaderMap,
) -> AppResult<Json<MessageResponse>> {
    auth::delete_account(&state, claims.user_id, bearer_token(&headers)).await?;
    Ok(Json(MessageResponse {
        message: "Account deleted successfully".into(),
    }))
}
