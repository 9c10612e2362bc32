//! Dock Server
//!
//! HTTP endpoint through which the controller reaches a dock's
//! orchestrator. Every request is answered with a [`DockResponse`];
//! operation failures are carried in the body, not the status code.

use super::orchestrator::DockOrchestrator;
use crate::domain::messages::{DockRequest, DockResponse};
use crate::error::{Error, Result};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Path of the dock remote-call endpoint
pub const DOCK_RPC_PATH: &str = "/v1/dock";

/// Default dock listen address
pub const DEFAULT_DOCK_ADDR: &str = "0.0.0.0:50050";

/// Build the dock router
pub fn dock_router(orchestrator: Arc<DockOrchestrator>) -> Router {
    Router::new()
        .route(DOCK_RPC_PATH, post(handle_request))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}

async fn handle_request(
    State(orchestrator): State<Arc<DockOrchestrator>>,
    Json(request): Json<DockRequest>,
) -> Json<DockResponse> {
    debug!("Dock request: {} {}", request.action, request.resource);
    Json(orchestrator.handle(request).await)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Serves the dock endpoint until shut down
pub struct DockServer {
    addr: SocketAddr,
    orchestrator: Arc<DockOrchestrator>,
    shutdown_tx: broadcast::Sender<()>,
}

impl DockServer {
    pub fn new(addr: SocketAddr, orchestrator: Arc<DockOrchestrator>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            addr,
            orchestrator,
            shutdown_tx,
        }
    }

    /// Run until [`shutdown`](Self::shutdown) is called
    pub async fn run(&self) -> Result<()> {
        let app = dock_router(self.orchestrator.clone());
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| Error::Internal(format!("Failed to bind dock server: {}", e)))?;
        info!("Dock server listening on {}", self.addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Dock server shutting down");
            })
            .await
            .map_err(|e| Error::Internal(format!("Dock server error: {}", e)))
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
