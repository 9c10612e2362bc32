//! Controller
//!
//! Entry point for northbound requests. Reads are served straight from
//! shared state. Volume, attachment and snapshot mutations are scheduled
//! onto a dock and forwarded over the [`DockService`](crate::domain::ports::DockService)
//! transport; the dock writes the resulting records itself.

use crate::domain::messages::{Action, DockRequest, ResourceKind};
use crate::domain::model::{
    known_versions, DockSpec, ExtraSpec, HostInfo, PoolSpec, ProfileSpec, VersionSpec,
    VolumeAttachmentSpec, VolumeSnapshotSpec, VolumeSpec,
};
use crate::domain::ports::DockServiceRef;
use crate::error::{Error, Result, ResultExt};
use crate::repository::ResourceRepository;
use crate::scheduler::Scheduler;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

// =============================================================================
// Inputs
// =============================================================================

/// Parameters of a new volume
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateVolumeInput {
    pub name: String,
    pub description: String,
    /// Size in GiB
    pub size: u64,
    /// Profile to place with; empty selects the default profile
    pub profile_id: String,
}

/// Parameters of a new attachment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateAttachmentInput {
    pub volume_id: String,
    pub host_info: HostInfo,
    pub do_local_attach: bool,
    pub multipath: bool,
}

/// Parameters of a new snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateSnapshotInput {
    pub name: String,
    pub description: String,
    pub volume_id: String,
}

// =============================================================================
// Controller
// =============================================================================

/// Schedules requests and forwards them to docks
pub struct Controller {
    scheduler: Scheduler,
    docks: DockServiceRef,
}

impl Controller {
    pub fn new(repo: Arc<ResourceRepository>, docks: DockServiceRef) -> Arc<Self> {
        Arc::new(Self {
            scheduler: Scheduler::new(repo),
            docks,
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn repo(&self) -> &Arc<ResourceRepository> {
        self.scheduler.repository()
    }

    async fn forward<T>(&self, dock: &DockSpec, request: DockRequest) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        debug!(
            "Forwarding {} {} to dock {} at {}",
            request.action, request.resource, dock.base.id, dock.endpoint
        );
        self.docks
            .call(&dock.endpoint, request)
            .await?
            .decode(&dock.endpoint)
    }

    async fn forward_unit(&self, dock: &DockSpec, request: DockRequest) -> Result<()> {
        self.docks
            .call(&dock.endpoint, request)
            .await?
            .into_result(&dock.endpoint)
            .map(|_| ())
    }

    // =========================================================================
    // API versions
    // =========================================================================

    pub fn list_versions(&self) -> Vec<VersionSpec> {
        known_versions()
    }

    pub fn get_version(&self, name: &str) -> Result<VersionSpec> {
        known_versions()
            .into_iter()
            .find(|v| v.name == name)
            .ok_or_else(|| Error::not_found("api version", name))
    }

    // =========================================================================
    // Docks and pools
    // =========================================================================

    pub async fn list_docks(&self) -> Result<Vec<DockSpec>> {
        self.repo().list_docks().await
    }

    pub async fn get_dock(&self, id: &str) -> Result<DockSpec> {
        self.repo().get_dock(id).await
    }

    pub async fn list_pools(&self) -> Result<Vec<PoolSpec>> {
        self.repo().list_pools().await
    }

    pub async fn get_pool(&self, id: &str) -> Result<PoolSpec> {
        self.repo().get_pool(id).await
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Store a new profile, assigning an id when none is given
    pub async fn create_profile(&self, mut profile: ProfileSpec) -> Result<ProfileSpec> {
        if profile.base.name.is_empty() {
            return Err(Error::Validation("profile name must not be empty".into()));
        }
        if profile.base.id.is_empty() {
            profile.base.id = uuid::Uuid::new_v4().to_string();
        }
        profile.base.created_at.get_or_insert_with(Utc::now);

        let profile = self.repo().create_profile(&profile).await?;
        info!("Created profile {} ({})", profile.base.id, profile.base.name);
        Ok(profile)
    }

    pub async fn list_profiles(&self) -> Result<Vec<ProfileSpec>> {
        self.repo().list_profiles().await
    }

    pub async fn get_profile(&self, id: &str) -> Result<ProfileSpec> {
        self.repo().get_profile(id).await
    }

    pub async fn update_profile(&self, id: &str, input: &ProfileSpec) -> Result<ProfileSpec> {
        self.repo().update_profile(id, input).await
    }

    pub async fn delete_profile(&self, id: &str) -> Result<()> {
        self.repo().delete_profile(id).await
    }

    pub async fn add_extra_properties(&self, id: &str, extra: ExtraSpec) -> Result<ExtraSpec> {
        self.repo().add_extra_properties(id, extra).await
    }

    pub async fn list_extra_properties(&self, id: &str) -> Result<ExtraSpec> {
        self.repo().list_extra_properties(id).await
    }

    pub async fn remove_extra_property(&self, id: &str, key: &str) -> Result<()> {
        self.repo().remove_extra_property(id, key).await
    }

    // =========================================================================
    // Volumes
    // =========================================================================

    /// Place a volume with its profile and create it on the owning dock
    pub async fn create_volume(&self, input: CreateVolumeInput) -> Result<VolumeSpec> {
        if input.size == 0 {
            return Err(Error::Validation("volume size must be at least 1 GiB".into()));
        }
        let placement = self.scheduler.schedule(&input.profile_id).await?;

        let mut request =
            DockRequest::new(ResourceKind::Volume, Action::Create, &placement.dock)?;
        request.volume_name = input.name;
        request.volume_description = input.description;
        request.volume_size = input.size;
        request.pool_id = placement.pool.base.id.clone();
        request.profile_id = placement.profile.base.id.clone();

        self.forward(&placement.dock, request)
            .await
            .with_context(|| format!("creating volume on dock {}", placement.dock.base.id))
    }

    pub async fn list_volumes(&self) -> Result<Vec<VolumeSpec>> {
        self.repo().list_volumes().await
    }

    pub async fn get_volume(&self, id: &str) -> Result<VolumeSpec> {
        self.repo().get_volume(id).await
    }

    /// Ask the dock hosting the volume for the driver's current view
    pub async fn inspect_volume(&self, id: &str) -> Result<VolumeSpec> {
        let dock = self.scheduler.resolve_dock_by_volume(id).await?;
        let request =
            DockRequest::new(ResourceKind::Volume, Action::Get, &dock)?.with_volume_id(id);
        self.forward(&dock, request).await
    }

    pub async fn delete_volume(&self, id: &str) -> Result<()> {
        let dock = self.scheduler.resolve_dock_by_volume(id).await?;
        let request =
            DockRequest::new(ResourceKind::Volume, Action::Delete, &dock)?.with_volume_id(id);

        self.forward_unit(&dock, request)
            .await
            .with_context(|| format!("deleting volume {}", id))
    }

    // =========================================================================
    // Attachments
    // =========================================================================

    pub async fn create_attachment(
        &self,
        input: CreateAttachmentInput,
    ) -> Result<VolumeAttachmentSpec> {
        let dock = self.scheduler.resolve_dock_by_volume(&input.volume_id).await?;

        let mut request = DockRequest::new(ResourceKind::Attachment, Action::Create, &dock)?
            .with_volume_id(input.volume_id.clone())
            .with_host_info(&input.host_info)?;
        request.do_local_attach = input.do_local_attach;
        request.multipath = input.multipath;

        self.forward(&dock, request)
            .await
            .with_context(|| format!("attaching volume {}", input.volume_id))
    }

    pub async fn list_attachments(&self, volume_id: &str) -> Result<Vec<VolumeAttachmentSpec>> {
        self.repo().list_attachments(volume_id).await
    }

    pub async fn get_attachment(&self, volume_id: &str, id: &str) -> Result<VolumeAttachmentSpec> {
        self.repo().get_attachment(volume_id, id).await
    }

    /// Record the mountpoint and host details of an existing attachment
    pub async fn update_attachment(
        &self,
        volume_id: &str,
        id: &str,
        mountpoint: &str,
        host: &HostInfo,
    ) -> Result<VolumeAttachmentSpec> {
        // Fail early on an unknown attachment instead of touching the driver
        self.repo().get_attachment(volume_id, id).await?;
        let dock = self.scheduler.resolve_dock_by_volume(volume_id).await?;

        let mut request = DockRequest::new(ResourceKind::Attachment, Action::Update, &dock)?
            .with_volume_id(volume_id)
            .with_host_info(host)?;
        request.attachment_id = id.to_string();
        request.mountpoint = mountpoint.to_string();

        self.forward(&dock, request).await
    }

    pub async fn delete_attachment(&self, volume_id: &str, id: &str) -> Result<()> {
        let dock = self.scheduler.resolve_dock_by_volume(volume_id).await?;

        let mut request = DockRequest::new(ResourceKind::Attachment, Action::Delete, &dock)?
            .with_volume_id(volume_id);
        request.attachment_id = id.to_string();

        self.forward_unit(&dock, request)
            .await
            .with_context(|| format!("detaching attachment {}", id))
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub async fn create_snapshot(&self, input: CreateSnapshotInput) -> Result<VolumeSnapshotSpec> {
        let dock = self.scheduler.resolve_dock_by_volume(&input.volume_id).await?;

        let mut request = DockRequest::new(ResourceKind::Snapshot, Action::Create, &dock)?
            .with_volume_id(input.volume_id.clone());
        request.snapshot_name = input.name;
        request.snapshot_description = input.description;

        self.forward(&dock, request)
            .await
            .with_context(|| format!("snapshotting volume {}", input.volume_id))
    }

    pub async fn list_snapshots(&self) -> Result<Vec<VolumeSnapshotSpec>> {
        self.repo().list_snapshots().await
    }

    pub async fn get_snapshot(&self, id: &str) -> Result<VolumeSnapshotSpec> {
        self.repo().get_snapshot(id).await
    }

    pub async fn delete_snapshot(&self, id: &str) -> Result<()> {
        let snapshot = self.repo().get_snapshot(id).await?;
        let dock = self
            .scheduler
            .resolve_dock_by_volume(&snapshot.volume_id)
            .await?;

        let mut request = DockRequest::new(ResourceKind::Snapshot, Action::Delete, &dock)?
            .with_volume_id(snapshot.volume_id.clone());
        request.snapshot_id = id.to_string();

        self.forward_unit(&dock, request)
            .await
            .with_context(|| format!("deleting snapshot {}", id))
    }
}
