//! fleetwatch - tablet fleet uptime service.

use fleetwatch::config::ServerConfig;
use fleetwatch::db::Store;
use fleetwatch::scheduler::Scheduler;
use fleetwatch::web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("fleetwatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting fleetwatch on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);
    tracing::info!(
        "Grouping days in {} with a {}m online grace window",
        cfg.timezone.name(),
        cfg.grace_minutes
    );

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // Start background ingestion and retention
    let scheduler = Arc::new(Scheduler::new(store.clone(), cfg.retention_days));
    scheduler.start();

    // Start web server
    let server = Server::new(cfg, store, scheduler);
    server.start().await?;

    Ok(())
}
