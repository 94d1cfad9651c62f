//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors; request-level errors go through
//! `kernel::error::AppError`.

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loyalty::domain::repository::SecurityRepository;
use loyalty::{AccrualClient, AccrualPoller, PgLoyaltyRepository, RetryPolicy, user_router};

mod config;
use config::Config;

/// In-flight requests get this long to finish once shutdown starts
const HTTP_DRAIN: Duration = Duration::from_secs(10);

/// Hard ceiling on the whole shutdown sequence
const SHUTDOWN_ABORT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,loyalty=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    config.validate()?;

    // Database connection
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_uri)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../database/migrations").run(&pool).await?;

    tracing::info!("Migrations completed");

    // The token-signing secret is generated on first boot and read once;
    // every handler shares the same copy for the life of the process.
    let repo = PgLoyaltyRepository::new(pool.clone());
    repo.init_secret_key().await?;
    let secret = repo.get_secret_key().await?;

    let app = user_router(repo.clone(), secret, RetryPolicy::default());

    // Accrual poller runs beside the HTTP server on a shared shutdown signal
    let accrual = AccrualClient::new(config.accrual_base())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller_task = tokio::spawn(AccrualPoller::new(repo, accrual).run(shutdown_rx.clone()));

    let listener = TcpListener::bind(&config.run_address).await?;
    tracing::info!(address = %config.run_address, "Starting server");

    let mut graceful_rx = shutdown_rx.clone();
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = graceful_rx.changed().await;
    });

    // On interrupt: flip the shutdown channel and arm the hard-abort watchdog
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);

        tokio::time::sleep(SHUTDOWN_ABORT).await;
        tracing::error!("Shutdown grace period exceeded, aborting");
        std::process::abort();
    });

    let mut drain_rx = shutdown_rx;
    tokio::select! {
        res = serve => res?,
        _ = async {
            let _ = drain_rx.changed().await;
            tokio::time::sleep(HTTP_DRAIN).await;
        } => {
            tracing::warn!("HTTP drain window elapsed before all requests finished");
        }
    }

    let _ = poller_task.await;
    tracing::info!("Server successful shutdown");

    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
