//! # fitstack_api
//!
//! HTTP API library for FitStack: session endpoints over the auth core.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use fitstack_core::auth::blacklist::TokenBlacklist;
use fitstack_core::auth::rate_limit::RateLimiter;

use crate::config::ApiConfig;
use crate::handlers::{auth, health};
use crate::services::google::GoogleTokenVerifier;

/// Shared application state passed to all handlers.
///
/// The rate limiter and blacklist are the only mutable shared state; both
/// live behind `Arc` here rather than in process-wide statics.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool.
    pub pool: PgPool,
    /// API configuration.
    pub config: ApiConfig,
    /// Per-(address, endpoint-class) abuse throttling.
    pub rate_limiter: Arc<RateLimiter>,
    /// Revoked access-token ids.
    pub blacklist: Arc<TokenBlacklist>,
    /// Google tokeninfo verification.
    pub token_verifier: Arc<GoogleTokenVerifier>,
}

/// Run embedded database migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    fitstack_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/api/health", get(health::health_handler))
        .route("/api/users/register", post(auth::register_handler))
        .route("/api/users/login", post(auth::login_handler))
        .route("/api/users/oauth/google", post(auth::google_auth_handler))
        .route("/api/users/refresh", post(auth::refresh_handler))
        .route("/api/users/logout", post(auth::logout_handler));

    // Protected routes: the soft gate attaches claims when the bearer token
    // verifies and is not blacklisted; the `AuthenticatedUser` extractor
    // rejects requests that arrive without them.
    let protected = Router::new()
        .route("/api/users/account", delete(auth::delete_account_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
