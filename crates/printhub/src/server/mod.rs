//! HTTP surface: order intake for the storefront and job dispatch for print
//! workers.

pub mod error;
pub mod handlers;

use std::net::SocketAddr;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::ServerConfig;
use crate::dispatch::JobDispatcher;
use crate::intake::OrderIntake;

pub use error::{ApiError, ApiResult};

/// Shared handler state. Both services are cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    pub intake: OrderIntake,
    pub dispatcher: JobDispatcher,
}

impl AppState {
    pub fn new(intake: OrderIntake, dispatcher: JobDispatcher) -> Self {
        Self { intake, dispatcher }
    }
}

pub fn router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route(
            "/orders",
            post(handlers::submit_order).get(handlers::list_orders),
        )
        .route("/orders/{id}", get(handlers::get_order))
        .route("/jobs/next", get(handlers::next_job))
        .route("/jobs/{id}/status", patch(handlers::update_status))
        .route("/quote", post(handlers::quote))
        .route("/health", get(handlers::health))
        // Paths used by existing storefront and worker deployments.
        .route("/api/upload", post(handlers::submit_order))
        .route("/api/print-jobs/new", get(handlers::next_job))
        .route("/api/print-jobs/{id}/status", patch(handlers::update_status))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `host:port` and serves until ctrl-c.
pub async fn serve(state: AppState, config: &ServerConfig) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    let local: SocketAddr = listener.local_addr()?;
    info!(%local, "PrintHub listening");

    axum::serve(listener, router(state, config))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
