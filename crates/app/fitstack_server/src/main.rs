//! FitStack API server binary.

use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use fitstack_api::config::ApiConfig;
use fitstack_api::services::google::GoogleTokenVerifier;
use fitstack_core::auth::blacklist::TokenBlacklist;
use fitstack_core::auth::rate_limit::RateLimiter;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "fitstack_server", about = "FitStack API server")]
struct Args {
    /// Address to bind (overrides `BIND_ADDR`).
    #[arg(long)]
    bind_addr: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fitstack_api=debug,fitstack_core=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    // A bad signing key must stop the process here, before anything binds.
    let mut config = ApiConfig::from_env()?;
    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr;
    }

    info!(database_url = %config.database_url, bind_addr = %config.bind_addr, "starting fitstack_server");

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.database_url)
        .await?;

    info!("running database migrations");
    fitstack_api::migrate(&pool).await?;

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limits.clone()));
    let blacklist = Arc::new(TokenBlacklist::new());
    let token_verifier = Arc::new(GoogleTokenVerifier::new(config.google_client_id.clone()));

    // Background eviction of expired blacklist entries and stale limiter
    // records, plus hourly hygiene for expired refresh-token rows.
    blacklist.spawn_cleanup_task();
    rate_limiter.spawn_cleanup_task();
    spawn_refresh_token_sweep(pool.clone());

    let state = fitstack_api::AppState {
        pool,
        config: config.clone(),
        rate_limiter,
        blacklist,
        token_verifier,
    };

    let app = fitstack_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Periodically delete refresh-token rows past their expiry. Hygiene only:
/// expired rows are already rejected at redemption.
fn spawn_refresh_token_sweep(pool: sqlx::PgPool) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match fitstack_core::auth::refresh::delete_expired(&pool).await {
                Ok(0) => {}
                Ok(n) => info!(deleted = n, "swept expired refresh tokens"),
                Err(e) => tracing::warn!(error = %e, "refresh-token sweep failed"),
            }
        }
    })
}
