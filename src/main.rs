//! Fishing Time - session and countdown tracker for fishing stations

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fishing_time::{
    api::{self, AppState, RequestStats},
    config::Config,
    db::{
        self,
        repositories::{
            SqlxDurationRepository, SqlxSessionRepository, SqlxTableNumberRepository,
            SqlxUserRepository,
        },
    },
    services::{Catalog, SessionMonitor, SessionService, SystemClock},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fishing_time=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Fishing Time...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let catalog = Catalog {
        tables: SqlxTableNumberRepository::boxed(pool.clone()),
        durations: SqlxDurationRepository::boxed(pool.clone()),
        users: SqlxUserRepository::boxed(pool.clone()),
    };

    // Start the lifecycle monitor
    let monitor = Arc::new(SessionMonitor::new(
        session_repo.clone(),
        Arc::new(SystemClock),
        config.tracker.clone(),
    ));
    if let Err(e) = monitor.refresh().await {
        tracing::warn!("Initial session load failed, monitor will retry: {:#}", e);
    }
    let monitor_handle = monitor.start();

    let session_service = Arc::new(SessionService::new(session_repo, catalog, monitor));

    let state = AppState {
        pool: pool.clone(),
        session_service,
        request_stats: Arc::new(RequestStats::new()),
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    monitor_handle.stop().await;
    pool.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
