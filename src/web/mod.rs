//! Web server module.

mod handlers;
mod reports;

pub use handlers::*;
pub use reports::*;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::scheduler::Scheduler;
use crate::uptime::UptimeEngine;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<Store>,
    pub scheduler: Arc<Scheduler>,
    pub engine: UptimeEngine,
}

/// Web server for fleetwatch.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, store: Arc<Store>, scheduler: Arc<Scheduler>) -> Self {
        let engine = UptimeEngine::new(config.calendar(), config.grace_minutes);
        Self {
            state: AppState {
                config,
                store,
                scheduler,
                engine,
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route("/api/devices", get(handlers::handle_get_devices))
            .route("/api/devices/{id}/uptime", get(handlers::handle_get_uptime))
            .route("/api/devices/{id}/week", get(handlers::handle_get_week))
            .route("/api/devices/{id}/month", get(handlers::handle_get_month))
            .route("/api/heartbeats", post(handlers::handle_ingest_heartbeats))
            .route("/api/status", get(handlers::handle_status))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(4 * 1024 * 1024)) // 4MB
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
