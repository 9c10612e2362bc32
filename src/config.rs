//! Configuration
//!
//! Settings come from an optional YAML file; command-line flags are
//! applied on top with [`Config::with_cli_overrides`]. Every section has
//! defaults, so an empty file is a valid configuration.

use crate::controlplane::api::DEFAULT_REST_ADDR;
use crate::dock::{ReconcilePolicy, DEFAULT_DOCK_ADDR, DEFAULT_INVENTORY_PATH};
use crate::error::{Error, Result, ResultExt};
use crate::repository::{KeySpace, ResourceRepository, DEFAULT_NAMESPACE};
use crate::store::{EtcdBackend, EtcdConfig, MemoryBackend, StateStore};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default metrics listen address
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9090";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub controller: ControllerConfig,
    pub dock: DockConfig,
    pub metrics: MetricsConfig,
}

/// Values taken from the command line; `None` keeps the file's value
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub store_backend: Option<StoreBackend>,
    pub store_endpoints: Vec<String>,
    pub controller_addr: Option<String>,
    pub dock_addr: Option<String>,
    pub inventory_path: Option<PathBuf>,
    pub metrics_addr: Option<String>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(Error::from)
            .with_context(|| format!("reading config file {}", path.display()))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content)
            .map_err(Error::from)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Apply command-line overrides
    pub fn with_cli_overrides(mut self, overrides: &CliOverrides) -> Self {
        if let Some(backend) = overrides.store_backend {
            self.store.backend = backend;
        }
        if !overrides.store_endpoints.is_empty() {
            self.store.endpoints = overrides.store_endpoints.clone();
        }
        if let Some(ref addr) = overrides.controller_addr {
            self.controller.listen_addr = addr.clone();
        }
        if let Some(ref addr) = overrides.dock_addr {
            self.dock.listen_addr = addr.clone();
        }
        if let Some(ref path) = overrides.inventory_path {
            self.dock.inventory_path = path.clone();
        }
        if let Some(ref addr) = overrides.metrics_addr {
            self.metrics.listen_addr = addr.clone();
        }
        self
    }
}

// =============================================================================
// Store
// =============================================================================

/// Key-value backend behind the state store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process map; state is lost on exit
    #[default]
    Memory,
    /// etcd v3 JSON gateway
    Etcd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// etcd gateway endpoints
    pub endpoints: Vec<String>,
    /// Key prefix of every record
    pub namespace: String,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            endpoints: vec!["http://localhost:2379".to_string()],
            namespace: DEFAULT_NAMESPACE.to_string(),
            timeout_secs: 3,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the repository over the configured backend
    pub fn build_repository(&self) -> Result<Arc<ResourceRepository>> {
        if self.timeout_secs == 0 {
            return Err(Error::Configuration("store timeout must be positive".into()));
        }

        let store = match self.backend {
            StoreBackend::Memory => StateStore::new(Arc::new(MemoryBackend::new()), self.timeout()),
            StoreBackend::Etcd => {
                let backend = EtcdBackend::new(EtcdConfig {
                    endpoints: self.endpoints.clone(),
                    request_timeout: self.timeout(),
                })?;
                StateStore::new(Arc::new(backend), self.timeout())
            }
        };
        Ok(ResourceRepository::with_keys(
            store,
            KeySpace::new(self.namespace.clone()),
        ))
    }
}

// =============================================================================
// Processes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// REST API bind address
    pub listen_addr: String,
    /// Timeout of one call to a dock, in seconds
    pub dock_call_timeout_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_REST_ADDR.to_string(),
            dock_call_timeout_secs: 60,
        }
    }
}

impl ControllerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        parse_addr("controller", &self.listen_addr)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockConfig {
    /// Dock endpoint bind address
    pub listen_addr: String,
    /// Inventory file read by discovery
    pub inventory_path: PathBuf,
    /// Retry policy for metadata writes after driver calls
    pub reconcile: ReconcilePolicy,
}

impl Default for DockConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_DOCK_ADDR.to_string(),
            inventory_path: PathBuf::from(DEFAULT_INVENTORY_PATH),
            reconcile: ReconcilePolicy::default(),
        }
    }
}

impl DockConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        parse_addr("dock", &self.listen_addr)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Metrics server bind address; empty disables the server
    pub listen_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_METRICS_ADDR.to_string(),
        }
    }
}

impl MetricsConfig {
    pub fn enabled(&self) -> bool {
        !self.listen_addr.is_empty()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        parse_addr("metrics", &self.listen_addr)
    }
}

fn parse_addr(what: &str, addr: &str) -> Result<SocketAddr> {
    addr.parse()
        .map_err(|e| Error::Configuration(format!("Invalid {} address {:?}: {}", what, addr, e)))
}
