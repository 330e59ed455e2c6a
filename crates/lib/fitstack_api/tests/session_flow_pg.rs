//! End-to-end session scenarios against a live PostgreSQL instance.
//!
//! These are ignored by default; point `DATABASE_URL` at a scratch database
//! and run `cargo test -p fitstack_api -- --ignored`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;
use uuid::Uuid;

use fitstack_api::config::ApiConfig;
use fitstack_api::services::google::GoogleTokenVerifier;
use fitstack_api::{AppState, router};
use fitstack_core::auth::blacklist::TokenBlacklist;
use fitstack_core::auth::rate_limit::{RateLimitConfig, RateLimiter};

const JWT_SECRET: &str = "integration-secret-integration-secret";

async fn setup() -> (AppState, Router) {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost:5432/fitstack".into());
    let pool = sqlx::PgPool::connect(&database_url).await.expect("connect");
    fitstack_api::migrate(&pool).await.expect("migrate");

    let state = AppState {
        pool,
        config: ApiConfig {
            bind_addr: "127.0.0.1:0".into(),
            database_url,
            jwt_secret: JWT_SECRET.into(),
            access_ttl_secs: 86_400,
            remember_me_ttl_secs: 2_592_000,
            refresh_ttl_secs: 604_800,
            google_client_id: String::new(),
            rate_limits: RateLimitConfig::default(),
        },
        rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::default())),
        blacklist: Arc::new(TokenBlacklist::new()),
        token_verifier: Arc::new(GoogleTokenVerifier::new(String::new())),
    };

    let app = router(state.clone()).layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
    (state, app)
}

fn unique_email() -> String {
    format!("user-{}@test.fitstack.dev", Uuid::new_v4())
}

fn json_request(method: &str, uri: &str, address: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", address)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn register(app: &Router, email: &str, password: &str) -> serde_json::Value {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/users/register",
            "198.51.100.10",
            serde_json::json!({"email": email, "password": password, "firstName": "Test"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn register_then_login_returns_a_usable_session() {
    let (_state, app) = setup().await;
    let email = unique_email();
    register(&app, &email, "pw-123456").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/users/login",
            "198.51.100.10",
            serde_json::json!({"email": email, "password": "pw-123456"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body["token"].as_str().unwrap().is_empty());
    assert!(!body["refreshToken"].as_str().unwrap().is_empty());
    // Default TTL, not the remember-me one.
    assert_eq!(body["expiresIn"], 86_400);
    assert_eq!(body["refreshTokenExpiresIn"], 604_800);
    assert_eq!(body["user"]["email"], email);
    assert_eq!(body["user"]["isOAuthUser"], false);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn login_failures_lock_the_address_out() {
    let (_state, app) = setup().await;
    let email = unique_email();
    register(&app, &email, "pw-123456").await;

    // The limiter is in-process and fresh per test state; no carryover
    // between runs.
    let address = "203.0.113.9";
    for _ in 0..5 {
        let (status, _) = send(
            &app,
            json_request(
                "POST",
                "/api/users/login",
                address,
                serde_json::json!({"email": email, "password": "wrong"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // Sixth attempt is refused outright, correct password or not.
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/users/login",
            address,
            serde_json::json!({"email": email, "password": "pw-123456"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS, "body: {body}");
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn unknown_email_and_wrong_password_are_indistinguishable() {
    let (_state, app) = setup().await;
    let email = unique_email();
    register(&app, &email, "pw-123456").await;

    let (status_a, body_a) = send(
        &app,
        json_request(
            "POST",
            "/api/users/login",
            "198.51.100.11",
            serde_json::json!({"email": unique_email(), "password": "pw-123456"}),
        ),
    )
    .await;
    let (status_b, body_b) = send(
        &app,
        json_request(
            "POST",
            "/api/users/login",
            "198.51.100.12",
            serde_json::json!({"email": email, "password": "wrong"}),
        ),
    )
    .await;

    assert_eq!(status_a, StatusCode::UNAUTHORIZED);
    assert_eq!(status_b, StatusCode::UNAUTHORIZED);
    assert_eq!(body_a, body_b);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn replaying_a_rotated_refresh_token_fails() {
    let (_state, app) = setup().await;
    let email = unique_email();
    let session = register(&app, &email, "pw-123456").await;
    let original = session["refreshToken"].as_str().unwrap().to_string();

    let (status, rotated) = send(
        &app,
        json_request(
            "POST",
            "/api/users/refresh",
            "198.51.100.20",
            serde_json::json!({"refreshToken": original}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(rotated["refreshToken"].as_str().unwrap(), original);

    // Replay of the consumed value.
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/users/refresh",
            "198.51.100.20",
            serde_json::json!({"refreshToken": original}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The rotated value still works.
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/users/refresh",
            "198.51.100.20",
            serde_json::json!({"refreshToken": rotated["refreshToken"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn concurrent_refreshes_of_one_token_produce_one_winner() {
    let (_state, app) = setup().await;
    let email = unique_email();
    let session = register(&app, &email, "pw-123456").await;
    let token = session["refreshToken"].as_str().unwrap().to_string();

    let req = |t: String| {
        json_request(
            "POST",
            "/api/users/refresh",
            "198.51.100.21",
            serde_json::json!({"refreshToken": t}),
        )
    };
    let (a, b) = tokio::join!(
        app.clone().oneshot(req(token.clone())),
        app.clone().oneshot(req(token.clone())),
    );

    let statuses = [a.unwrap().status(), b.unwrap().status()];
    let wins = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    assert_eq!(wins, 1, "statuses: {statuses:?}");
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn logout_blacklists_the_access_token() {
    let (_state, app) = setup().await;
    let email = unique_email();
    let session = register(&app, &email, "pw-123456").await;
    let access = session["token"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/users/logout")
            .header(header::AUTHORIZATION, format!("Bearer {access}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The token is cryptographically valid until its natural expiry, but
    // the gate now treats it as absent.
    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri("/api/users/account")
            .header(header::AUTHORIZATION, format!("Bearer {access}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // And the refresh token died with the session.
    let refresh = session["refreshToken"].as_str().unwrap();
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/users/refresh",
            "198.51.100.22",
            serde_json::json!({"refreshToken": refresh}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn account_deletion_removes_the_user_and_their_tokens() {
    let (state, app) = setup().await;
    let email = unique_email();
    let session = register(&app, &email, "pw-123456").await;
    let access = session["token"].as_str().unwrap().to_string();
    let user_id = session["user"]["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri("/api/users/account")
            .header(header::AUTHORIZATION, format!("Bearer {access}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let user_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&state.pool)
        .await
        .unwrap();
    assert_eq!(user_rows, 0);

    let token_rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&state.pool)
            .await
            .unwrap();
    assert_eq!(token_rows, 0);

    // Login for the deleted account fails like any unknown email.
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/users/login",
            "198.51.100.23",
            serde_json::json!({"email": email, "password": "pw-123456"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
