//! Web server module: the ingestion and read-only query boundary.

mod handlers;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::liveness::LivenessMachine;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub machine: Arc<LivenessMachine>,
}

/// Web server for pulsewatch.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, store: Arc<Store>, machine: Arc<LivenessMachine>) -> Self {
        Self {
            config,
            state: AppState { store, machine },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            // Report ingestion
            .route("/heartbeat", post(handlers::handle_heartbeat))
            .route("/speedtest", post(handlers::handle_speedtest))
            // Read-only listings
            .route("/devices", get(handlers::handle_get_devices))
            .route("/probes", get(handlers::handle_get_probes))
            .route("/states", get(handlers::handle_get_states))
            .route("/events", get(handlers::handle_get_events))
            .route("/heartbeats", get(handlers::handle_get_heartbeats))
            .route("/speedtests", get(handlers::handle_get_speedtests))
            .layer(cors)
            .layer(DefaultBodyLimit::max(64 * 1024))
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
