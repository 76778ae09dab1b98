use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use checkin_api::{app, config, jobs, middleware, services};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = config::Config::load()?;

    middleware::logging::init_logging(&config.logging);
    middleware::init_metrics()?;

    info!("Starting check-in API v{}", env!("CARGO_PKG_VERSION"));

    let db_config: persistence::db::DatabaseConfig = (&config.database).into();
    let pool = persistence::db::create_pool(&db_config).await?;

    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await?;
    info!("Migrations completed");

    services::admin_bootstrap::bootstrap_admin(&pool, &config.admin).await?;

    let addr = config.socket_addr()?;
    let state = app::AppState::with_system_clock(config, pool.clone())?;

    let mut scheduler = jobs::JobScheduler::new();
    scheduler.register(jobs::PoolMetricsJob::new(pool));
    if let Some(limiter) = state.login_limiter.clone() {
        scheduler.register(jobs::RateLimitCleanupJob::new(limiter));
    }
    scheduler.start();

    let app = app::build_router(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
