use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use uptime_timeline::common::AppState;
use uptime_timeline::config::Config;
use uptime_timeline::hass::HassClient;
use uptime_timeline::routes;
use uptime_timeline::services::{DbStore, KeyValueStore, MemoryStore};
use uptime_timeline::sync;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,uptime_timeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting uptime-timeline...");

    // Load configuration (fail-fast)
    let config = Config::from_env()?;
    tracing::info!(
        host = %config.api_host,
        port = config.api_port,
        hass = %config.hass_base_url,
        entities = config.timeline_entities.len(),
        "Configuration loaded"
    );

    // Snapshot store: Postgres when configured, in-memory otherwise
    let store: Arc<dyn KeyValueStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let db = Database::connect(url).await?;
            tracing::info!("Running migrations...");
            migration::Migrator::up(&db, None).await?;
            tracing::info!("Database cache store ready");
            Arc::new(DbStore::new(db))
        }
        None => {
            tracing::warn!(
                max_bytes = config.cache_max_bytes,
                "DATABASE_URL not set, timeline cache is in-memory only"
            );
            Arc::new(MemoryStore::new(config.cache_max_bytes))
        }
    };

    let hass_client = HassClient::new(&config)?;
    tracing::info!("Home Assistant client initialized");

    let state = AppState::new(config.clone(), Arc::new(hass_client), store);

    // Background refresh (fire-and-forget, non-blocking)
    tokio::spawn(sync::scheduler::run_timeline_refresh(state.clone()));

    let app = routes::build_router(state)?;

    // Start server with graceful shutdown
    let addr = config.bind_address();
    tracing::info!(address = %addr, "Starting server");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        },
    }
}
