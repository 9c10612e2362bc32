//! Discovery
//!
//! At dock start-up the local docks and pools are read from an inventory
//! source and registered in shared state, docks first. Registration is a
//! plain overwrite, so running discovery again replaces earlier records.

use crate::domain::model::{DockSpec, PoolSpec};
use crate::domain::ports::{InventorySource, InventorySourceRef};
use crate::error::{Error, Result, ResultExt};
use crate::metrics;
use crate::repository::ResourceRepository;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Default location of the dock inventory file
pub const DEFAULT_INVENTORY_PATH: &str = "/etc/sds/dock.yaml";

// =============================================================================
// Inventory
// =============================================================================

/// Docks and pools local to one dock node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inventory {
    pub docks: Vec<DockSpec>,
    pub pools: Vec<PoolSpec>,
}

impl Inventory {
    /// Parse an inventory document; `.json` files are JSON, anything else YAML.
    ///
    /// An empty document is an empty inventory.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Ok(serde_json::from_str(content)?)
        } else {
            Ok(serde_yaml::from_str(content)?)
        }
    }
}

#[async_trait]
impl InventorySource for Inventory {
    async fn list_docks(&self) -> Result<Vec<DockSpec>> {
        Ok(self.docks.clone())
    }

    async fn list_pools(&self) -> Result<Vec<PoolSpec>> {
        Ok(self.pools.clone())
    }
}

/// Inventory read from a file on every listing
#[derive(Debug, Clone)]
pub struct FileInventory {
    path: PathBuf,
}

impl FileInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Inventory> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(Error::from)
            .with_context(|| format!("reading inventory {}", self.path.display()))?;
        Inventory::parse(&self.path, &content)
            .with_context(|| format!("parsing inventory {}", self.path.display()))
    }
}

#[async_trait]
impl InventorySource for FileInventory {
    async fn list_docks(&self) -> Result<Vec<DockSpec>> {
        Ok(self.load().await?.docks)
    }

    async fn list_pools(&self) -> Result<Vec<PoolSpec>> {
        Ok(self.load().await?.pools)
    }
}

// =============================================================================
// Discovery
// =============================================================================

/// What a discovery run registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub docks: usize,
    pub pools: usize,
}

/// Registers the local inventory in shared state
pub struct Discovery {
    repo: Arc<ResourceRepository>,
    source: InventorySourceRef,
}

impl Discovery {
    pub fn new(repo: Arc<ResourceRepository>, source: InventorySourceRef) -> Self {
        Self { repo, source }
    }

    /// Register every discovered dock, then every discovered pool.
    ///
    /// Fails with [`Error::EmptyResource`] when either list is empty and
    /// with a validation error when a pool names an unknown dock. Nothing
    /// is written unless every record passes validation.
    pub async fn run(&self) -> Result<DiscoveryReport> {
        let docks = self.source.list_docks().await?;
        if docks.is_empty() {
            return Err(Error::EmptyResource { kind: "dock" });
        }
        let pools = self.source.list_pools().await?;
        if pools.is_empty() {
            return Err(Error::EmptyResource { kind: "pool" });
        }

        let mut known: BTreeSet<String> = docks.iter().map(|d| d.base.id.clone()).collect();
        for pool in &pools {
            if known.contains(&pool.dock_id) {
                continue;
            }
            match self.repo.get_dock(&pool.dock_id).await {
                Ok(_) => {
                    known.insert(pool.dock_id.clone());
                }
                Err(e) if e.is_not_found() => {
                    return Err(Error::Validation(format!(
                        "pool {} references unknown dock {:?}",
                        pool.base.id, pool.dock_id
                    )));
                }
                Err(e) => return Err(e),
            }
        }

        let now = Utc::now();
        for mut dock in docks.iter().cloned() {
            dock.base.created_at.get_or_insert(now);
            self.repo.create_dock(&dock).await?;
            debug!("Registered dock {} at {}", dock.base.id, dock.endpoint);
        }
        for mut pool in pools.iter().cloned() {
            pool.base.created_at.get_or_insert(now);
            pool.refresh_free_capacity();
            self.repo.create_pool(&pool).await?;
            debug!("Registered pool {} on dock {}", pool.base.id, pool.dock_id);
        }

        metrics::record_discovered("dock", docks.len());
        metrics::record_discovered("pool", pools.len());
        info!("Discovery registered {} docks and {} pools", docks.len(), pools.len());

        Ok(DiscoveryReport {
            docks: docks.len(),
            pools: pools.len(),
        })
    }
}
