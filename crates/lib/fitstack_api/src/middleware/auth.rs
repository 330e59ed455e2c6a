//! Authenticated-request gate.
//!
//! Verifies the bearer token (signature + expiry) and checks the blacklist.
//! Failures never reject here: the request proceeds unauthenticated and the
//! [`AuthenticatedUser`] extractor rejects downstream where authentication
//! is actually required.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

use fitstack_core::auth::jwt::verify_access_token;
use fitstack_core::models::auth::AccessClaims;

use crate::AppState;
use crate::error::AppError;

/// Claims of the verified caller, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub AccessClaims);

/// Soft gate: attaches [`AuthenticatedUser`] when the bearer token verifies
/// and is not blacklisted; otherwise the request passes through untouched.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(claims) = bearer_claims(&state, request.headers()) {
        request.extensions_mut().insert(AuthenticatedUser(claims));
    }
    next.run(request).await
}

fn bearer_claims(state: &AppState, headers: &HeaderMap) -> Option<AccessClaims> {
    let token = bearer_token(headers)?;
    let claims = verify_access_token(token, state.config.jwt_secret.as_bytes()).ok()?;
    // A revoked token is treated exactly like no token at all.
    if state.blacklist.is_blacklisted(&claims.jti) {
        return None;
    }
    Some(claims)
}

/// Extract the raw token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
    }
}
