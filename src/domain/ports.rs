//! Domain Ports - trait boundaries of the control plane
//!
//! Adapters implement these traits: key-value backends for the state
//! store, storage drivers on each dock, inventory sources for discovery, and
//! the remote-call transport between the controller and the docks.

use crate::domain::messages::{DockRequest, DockResponse};
use crate::domain::model::{
    DockSpec, HostInfo, PoolSpec, VolumeAttachmentSpec, VolumeSnapshotSpec, VolumeSpec,
};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

// =============================================================================
// Key-Value Backend Port
// =============================================================================

/// Raw access to a consistent key-value store
///
/// Implementations report every failure as [`crate::Error::Store`].
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Write `value` at `key`, overwriting any previous value
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Read the value at `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Read every value whose key starts with `prefix`, in key order
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove `key`; removing a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Release connections held by the backend
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Backend name for logs
    fn backend_name(&self) -> &str;
}

// =============================================================================
// Volume Driver Port
// =============================================================================

/// Lifecycle operations every storage driver must provide
#[async_trait]
pub trait VolumeDriver: Send + Sync {
    /// Driver name as carried on the dock record
    fn driver_name(&self) -> &str;

    /// Allocate a volume of `size` GiB
    async fn create_volume(&self, name: &str, description: &str, size: u64) -> Result<VolumeSpec>;

    async fn get_volume(&self, volume_id: &str) -> Result<VolumeSpec>;

    async fn delete_volume(&self, volume_id: &str) -> Result<()>;

    /// Export a volume to `host`
    async fn create_attachment(
        &self,
        volume_id: &str,
        do_local_attach: bool,
        multipath: bool,
        host: &HostInfo,
    ) -> Result<VolumeAttachmentSpec>;

    /// Record the mountpoint used on `host`
    async fn update_attachment(&self, volume_id: &str, host: &str, mountpoint: &str) -> Result<()>;

    /// Tear down the export of a volume
    async fn delete_attachment(&self, volume_id: &str) -> Result<()>;

    async fn create_snapshot(
        &self,
        name: &str,
        volume_id: &str,
        description: &str,
    ) -> Result<VolumeSnapshotSpec>;

    async fn get_snapshot(&self, snapshot_id: &str) -> Result<VolumeSnapshotSpec>;

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()>;
}

// =============================================================================
// Inventory Port
// =============================================================================

/// Source of the docks and pools local to a dock node
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn list_docks(&self) -> Result<Vec<DockSpec>>;

    async fn list_pools(&self) -> Result<Vec<PoolSpec>>;
}

// =============================================================================
// Dock Transport Port
// =============================================================================

/// Transport used by the controller to reach a dock's orchestrator
#[async_trait]
pub trait DockService: Send + Sync {
    /// Deliver `request` to the dock listening at `endpoint`
    async fn call(&self, endpoint: &str, request: DockRequest) -> Result<DockResponse>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type KvBackendRef = Arc<dyn KvBackend>;
pub type VolumeDriverRef = Arc<dyn VolumeDriver>;
pub type InventorySourceRef = Arc<dyn InventorySource>;
pub type DockServiceRef = Arc<dyn DockService>;
