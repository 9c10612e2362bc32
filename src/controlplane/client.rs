//! Dock clients
//!
//! [`HttpDockClient`] posts requests to a remote dock server.
//! [`LocalDockService`] hands them straight to an in-process orchestrator,
//! which is what the standalone mode and the tests use.

use crate::dock::{DockOrchestrator, DOCK_RPC_PATH};
use crate::domain::messages::{DockRequest, DockResponse};
use crate::domain::ports::DockService;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default timeout of one remote dock call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Reaches docks over HTTP
#[derive(Clone)]
pub struct HttpDockClient {
    client: reqwest::Client,
}

impl HttpDockClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build dock client: {}", e)))?;
        Ok(Self { client })
    }

    /// URL of the dock endpoint; bare `host:port` endpoints get `http://`
    pub fn url_for(endpoint: &str) -> String {
        let base = endpoint.trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            format!("{}{}", base, DOCK_RPC_PATH)
        } else {
            format!("http://{}{}", base, DOCK_RPC_PATH)
        }
    }
}

#[async_trait]
impl DockService for HttpDockClient {
    async fn call(&self, endpoint: &str, request: DockRequest) -> Result<DockResponse> {
        let url = Self::url_for(endpoint);
        debug!("POST {} ({} {})", url, request.action, request.resource);

        let unreachable = |reason: String| Error::RemoteCall {
            endpoint: endpoint.to_string(),
            reason,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(unreachable(format!("HTTP {}: {}", status, body)));
        }

        response
            .json::<DockResponse>()
            .await
            .map_err(|e| unreachable(format!("undecodable dock response: {}", e)))
    }
}

/// Delivers requests to an orchestrator in the same process
#[derive(Clone)]
pub struct LocalDockService {
    orchestrator: Arc<DockOrchestrator>,
}

impl LocalDockService {
    pub fn new(orchestrator: Arc<DockOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl DockService for LocalDockService {
    async fn call(&self, _endpoint: &str, request: DockRequest) -> Result<DockResponse> {
        Ok(self.orchestrator.handle(request).await)
    }
}
