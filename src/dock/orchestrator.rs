//! Dock Orchestrator
//!
//! Executes lifecycle operations against the driver named on the dock
//! record and writes the outcome to shared state. Each operation follows
//! the same order:
//!
//! 1. call the driver
//! 2. on success, commit the metadata through the [`Reconciler`]
//!
//! A driver failure leaves shared state untouched. Pool capacity figures
//! are adjusted after volume create/delete on a best-effort basis.

use super::drivers::DriverRegistry;
use super::reconcile::Reconciler;
use crate::domain::messages::{Action, DockRequest, DockResponse, ResourceKind};
use crate::domain::model::{DockSpec, VolumeAttachmentSpec, VolumeSnapshotSpec, VolumeSpec};
use crate::domain::ports::VolumeDriverRef;
use crate::error::{Error, Result, ResultExt};
use crate::metrics;
use crate::repository::ResourceRepository;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

const VOLUME_IN_USE: &str = "in-use";
const VOLUME_AVAILABLE: &str = "available";

/// Runs dock requests against local drivers
pub struct DockOrchestrator {
    repo: Arc<ResourceRepository>,
    drivers: DriverRegistry,
    reconciler: Reconciler,
}

impl DockOrchestrator {
    pub fn new(
        repo: Arc<ResourceRepository>,
        drivers: DriverRegistry,
        reconciler: Reconciler,
    ) -> Arc<Self> {
        info!("Dock orchestrator using drivers {:?}", drivers.names());
        Arc::new(Self {
            repo,
            drivers,
            reconciler,
        })
    }

    pub fn repository(&self) -> &Arc<ResourceRepository> {
        &self.repo
    }

    pub fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    // =========================================================================
    // Request Dispatch
    // =========================================================================

    /// Execute `request` and encode the outcome; never fails
    pub async fn handle(&self, request: DockRequest) -> DockResponse {
        let started = Instant::now();
        let resource = request.resource.to_string();
        let action = request.action.to_string();

        let result = self.dispatch(&request).await;
        metrics::record_operation(&resource, &action, result.is_ok(), started.elapsed());

        match result {
            Ok(response) => {
                debug!("{} {} succeeded in {:?}", action, resource, started.elapsed());
                response
            }
            Err(e) => {
                error!("When {} {} in dock module: {}", action, resource, e);
                DockResponse::failure(&e)
            }
        }
    }

    async fn dispatch(&self, request: &DockRequest) -> Result<DockResponse> {
        match (request.resource, request.action) {
            (ResourceKind::Volume, Action::Create) => {
                DockResponse::with_resource(&self.create_volume(request).await?)
            }
            (ResourceKind::Volume, Action::Get) => {
                DockResponse::with_resource(&self.get_volume(request).await?)
            }
            (ResourceKind::Volume, Action::Delete) => {
                self.delete_volume(request).await?;
                Ok(DockResponse::success("Delete volume success"))
            }
            (ResourceKind::Attachment, Action::Create) => {
                DockResponse::with_resource(&self.create_attachment(request).await?)
            }
            (ResourceKind::Attachment, Action::Update) => {
                DockResponse::with_resource(&self.update_attachment(request).await?)
            }
            (ResourceKind::Attachment, Action::Delete) => {
                self.delete_attachment(request).await?;
                Ok(DockResponse::success("Delete volume attachment success"))
            }
            (ResourceKind::Snapshot, Action::Create) => {
                DockResponse::with_resource(&self.create_snapshot(request).await?)
            }
            (ResourceKind::Snapshot, Action::Get) => {
                DockResponse::with_resource(&self.get_snapshot(request).await?)
            }
            (ResourceKind::Snapshot, Action::Delete) => {
                self.delete_snapshot(request).await?;
                Ok(DockResponse::success("Delete snapshot success"))
            }
            (resource, action) => Err(Error::Validation(format!(
                "{} {} is not a dock operation",
                action, resource
            ))),
        }
    }

    fn driver_for(&self, request: &DockRequest) -> Result<(DockSpec, VolumeDriverRef)> {
        let dock = request.dock()?;
        let driver = self.drivers.get(&dock.driver_name)?;
        Ok((dock, driver))
    }

    // =========================================================================
    // Volumes
    // =========================================================================

    /// Allocate a volume in the requested pool and record it
    pub async fn create_volume(&self, request: &DockRequest) -> Result<VolumeSpec> {
        let (dock, driver) = self.driver_for(request)?;
        if request.pool_id.is_empty() {
            return Err(Error::Validation("volume request carries no pool id".into()));
        }
        self.repo
            .get_pool(&request.pool_id)
            .await
            .with_context(|| format!("checking pool for volume {}", request.volume_name))?;

        let mut volume = driver
            .create_volume(
                &request.volume_name,
                &request.volume_description,
                request.volume_size,
            )
            .await
            .with_context(|| format!("creating volume on dock {}", dock.base.id))?;
        volume.pool_id = request.pool_id.clone();
        volume.profile_id = request.profile_id.clone();

        let stored = self
            .reconciler
            .commit("volume", &volume.base.id, || self.repo.create_volume(&volume))
            .await?;

        self.adjust_pool_usage(&stored.pool_id, to_delta(stored.size))
            .await;
        info!(
            "Created volume {} ({} GiB) in pool {}",
            stored.base.id, stored.size, stored.pool_id
        );
        Ok(stored)
    }

    pub async fn get_volume(&self, request: &DockRequest) -> Result<VolumeSpec> {
        let (_, driver) = self.driver_for(request)?;
        driver.get_volume(&request.volume_id).await
    }

    /// Deallocate a volume, then remove its record.
    ///
    /// A volume that still has snapshots is refused; a snapshot is deleted
    /// through the dock of its source volume.
    pub async fn delete_volume(&self, request: &DockRequest) -> Result<()> {
        let (dock, driver) = self.driver_for(request)?;
        let id = request.volume_id.as_str();

        let snapshots = self
            .repo
            .list_snapshots()
            .await?
            .into_iter()
            .filter(|s| s.volume_id == id)
            .count();
        if snapshots > 0 {
            return Err(Error::Validation(format!(
                "volume {} still has {} snapshot(s); delete them first",
                id, snapshots
            )));
        }

        let record = self.repo.get_volume(id).await.ok();

        driver
            .delete_volume(id)
            .await
            .with_context(|| format!("deleting volume {} on dock {}", id, dock.base.id))?;

        self.reconciler
            .commit("volume", id, || self.repo.delete_volume(id))
            .await?;

        match record {
            Some(volume) => {
                self.adjust_pool_usage(&volume.pool_id, -to_delta(volume.size))
                    .await
            }
            None => warn!("Volume {} had no record; pool usage left unchanged", id),
        }
        info!("Deleted volume {}", id);
        Ok(())
    }

    // =========================================================================
    // Attachments
    // =========================================================================

    /// Export a volume to the requested host and record the attachment
    pub async fn create_attachment(&self, request: &DockRequest) -> Result<VolumeAttachmentSpec> {
        let (_, driver) = self.driver_for(request)?;
        let host = request.host()?;
        let volume_id = request.volume_id.as_str();

        let attachment = driver
            .create_attachment(volume_id, request.do_local_attach, request.multipath, &host)
            .await
            .with_context(|| format!("attaching volume {}", volume_id))?;

        let stored = self
            .reconciler
            .commit("attachment", &attachment.base.id, || {
                self.repo.create_attachment(volume_id, &attachment)
            })
            .await?;

        self.set_volume_status(volume_id, VOLUME_IN_USE).await;
        Ok(stored)
    }

    /// Record the mountpoint and host details of an attachment
    pub async fn update_attachment(&self, request: &DockRequest) -> Result<VolumeAttachmentSpec> {
        let (_, driver) = self.driver_for(request)?;
        let host = request.host()?;
        let volume_id = request.volume_id.as_str();
        let attachment_id = request.attachment_id.as_str();

        driver
            .update_attachment(volume_id, &host.host, &request.mountpoint)
            .await
            .with_context(|| format!("updating attachment {}", attachment_id))?;

        self.reconciler
            .commit("attachment", attachment_id, || {
                self.repo
                    .update_attachment(volume_id, attachment_id, &request.mountpoint, &host)
            })
            .await
    }

    /// Tear down an export and remove the attachment record.
    ///
    /// A driver reporting that the volume is not in use means there is
    /// nothing left to detach, so the record is removed anyway.
    pub async fn delete_attachment(&self, request: &DockRequest) -> Result<()> {
        let (_, driver) = self.driver_for(request)?;
        let volume_id = request.volume_id.as_str();
        let attachment_id = request.attachment_id.as_str();

        match driver.delete_attachment(volume_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_in_use() => {
                warn!(
                    "Volume {} was not attached ({}); removing attachment {} anyway",
                    volume_id, e, attachment_id
                );
            }
            Err(e) => {
                return Err(e.context(format!("detaching attachment {}", attachment_id)));
            }
        }

        self.reconciler
            .commit("attachment", attachment_id, || {
                self.repo.delete_attachment(volume_id, attachment_id)
            })
            .await?;

        self.set_volume_status(volume_id, VOLUME_AVAILABLE).await;
        Ok(())
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub async fn create_snapshot(&self, request: &DockRequest) -> Result<VolumeSnapshotSpec> {
        let (_, driver) = self.driver_for(request)?;

        let snapshot = driver
            .create_snapshot(
                &request.snapshot_name,
                &request.volume_id,
                &request.snapshot_description,
            )
            .await
            .with_context(|| format!("snapshotting volume {}", request.volume_id))?;

        self.reconciler
            .commit("snapshot", &snapshot.base.id, || {
                self.repo.create_snapshot(&snapshot)
            })
            .await
    }

    pub async fn get_snapshot(&self, request: &DockRequest) -> Result<VolumeSnapshotSpec> {
        let (_, driver) = self.driver_for(request)?;
        driver.get_snapshot(&request.snapshot_id).await
    }

    pub async fn delete_snapshot(&self, request: &DockRequest) -> Result<()> {
        let (_, driver) = self.driver_for(request)?;
        let id = request.snapshot_id.as_str();

        driver
            .delete_snapshot(id)
            .await
            .with_context(|| format!("deleting snapshot {}", id))?;

        self.reconciler
            .commit("snapshot", id, || self.repo.delete_snapshot(id))
            .await
    }

    // =========================================================================
    // Best-effort bookkeeping
    // =========================================================================

    async fn adjust_pool_usage(&self, pool_id: &str, delta: i64) {
        if let Err(e) = self.repo.adjust_pool_usage(pool_id, delta).await {
            warn!("Failed to adjust usage of pool {} by {} GiB: {}", pool_id, delta, e);
        }
    }

    async fn set_volume_status(&self, volume_id: &str, status: &str) {
        let input = VolumeSpec {
            status: status.to_string(),
            ..Default::default()
        };
        if let Err(e) = self.repo.update_volume(volume_id, &input).await {
            warn!("Failed to mark volume {} {}: {}", volume_id, status, e);
        }
    }
}

fn to_delta(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dock::drivers::SampleDriver;
    use crate::dock::reconcile::ReconcilePolicy;
    use crate::domain::messages::ResponseStatus;
    use crate::domain::model::{BaseModel, HostInfo, PoolSpec};
    use crate::domain::ports::{KvBackend, VolumeDriver};
    use crate::error::{DriverFailure, ErrorKind};
    use crate::store::{MemoryBackend, StateStore, DEFAULT_STORE_TIMEOUT};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // -------------------------------------------------------------------------
    // Scripted driver: sample behaviour with a configurable detach failure
    // -------------------------------------------------------------------------

    struct ScriptedDriver {
        inner: SampleDriver,
        detach_failure: Option<DriverFailure>,
        detach_calls: AtomicUsize,
    }

    impl ScriptedDriver {
        fn failing_detach(failure: DriverFailure) -> Self {
            Self {
                inner: SampleDriver::new(),
                detach_failure: Some(failure),
                detach_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl VolumeDriver for ScriptedDriver {
        fn driver_name(&self) -> &str {
            "scripted"
        }

        async fn create_volume(
            &self,
            name: &str,
            description: &str,
            size: u64,
        ) -> Result<VolumeSpec> {
            self.inner.create_volume(name, description, size).await
        }

        async fn get_volume(&self, volume_id: &str) -> Result<VolumeSpec> {
            self.inner.get_volume(volume_id).await
        }

        async fn delete_volume(&self, volume_id: &str) -> Result<()> {
            self.inner.delete_volume(volume_id).await
        }

        async fn create_attachment(
            &self,
            volume_id: &str,
            do_local_attach: bool,
            multipath: bool,
            host: &HostInfo,
        ) -> Result<VolumeAttachmentSpec> {
            self.inner
                .create_attachment(volume_id, do_local_attach, multipath, host)
                .await
        }

        async fn update_attachment(
            &self,
            volume_id: &str,
            host: &str,
            mountpoint: &str,
        ) -> Result<()> {
            self.inner.update_attachment(volume_id, host, mountpoint).await
        }

        async fn delete_attachment(&self, _volume_id: &str) -> Result<()> {
            self.detach_calls.fetch_add(1, Ordering::SeqCst);
            match &self.detach_failure {
                Some(failure) => Err(Error::driver(
                    "scripted",
                    "delete attachment",
                    failure.clone(),
                )),
                None => Ok(()),
            }
        }

        async fn create_snapshot(
            &self,
            name: &str,
            volume_id: &str,
            description: &str,
        ) -> Result<VolumeSnapshotSpec> {
            self.inner.create_snapshot(name, volume_id, description).await
        }

        async fn get_snapshot(&self, snapshot_id: &str) -> Result<VolumeSnapshotSpec> {
            self.inner.get_snapshot(snapshot_id).await
        }

        async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
            self.inner.delete_snapshot(snapshot_id).await
        }
    }

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    fn dock(driver: &str) -> DockSpec {
        DockSpec {
            base: BaseModel {
                id: "d1".into(),
                name: "dock-1".into(),
                ..BaseModel::new("", "")
            },
            endpoint: "127.0.0.1:50050".into(),
            driver_name: driver.into(),
        }
    }

    fn pool() -> PoolSpec {
        PoolSpec {
            base: BaseModel {
                id: "p1".into(),
                name: "fast".into(),
                ..BaseModel::new("", "")
            },
            dock_id: "d1".into(),
            total_capacity: 100,
            free_capacity: 100,
            used_capacity: 0,
            parameters: BTreeMap::from([("ssd".to_string(), "true".to_string())]),
        }
    }

    /// Memory backend that rejects every volume write
    #[derive(Default)]
    struct VolumeWritesFail {
        inner: MemoryBackend,
    }

    #[async_trait]
    impl KvBackend for VolumeWritesFail {
        async fn put(&self, key: &str, value: &str) -> Result<()> {
            if key.contains("/volumes/") {
                return Err(Error::Store {
                    operation: "put",
                    key: key.to_string(),
                    reason: "no leader".into(),
                });
            }
            self.inner.put(key, value).await
        }

        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn list(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.list(prefix).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }

        fn backend_name(&self) -> &str {
            "volume-writes-fail"
        }
    }

    async fn orchestrator(driver: VolumeDriverRef) -> Arc<DockOrchestrator> {
        orchestrator_with(ResourceRepository::in_memory(), driver).await
    }

    async fn orchestrator_with(
        repo: Arc<ResourceRepository>,
        driver: VolumeDriverRef,
    ) -> Arc<DockOrchestrator> {
        repo.create_dock(&dock(driver.driver_name())).await.unwrap();
        repo.create_pool(&pool()).await.unwrap();

        let mut drivers = DriverRegistry::new();
        drivers.register(driver);
        DockOrchestrator::new(repo, drivers, Reconciler::new(ReconcilePolicy::disabled()))
    }

    fn create_volume_request(driver: &str, size: u64) -> DockRequest {
        let mut request =
            DockRequest::new(ResourceKind::Volume, Action::Create, &dock(driver)).unwrap();
        request.volume_name = "db-data".into();
        request.volume_size = size;
        request.pool_id = "p1".into();
        request.profile_id = "pr1".into();
        request
    }

    fn request(resource: ResourceKind, action: Action, driver: &str) -> DockRequest {
        DockRequest::new(resource, action, &dock(driver)).unwrap()
    }

    fn host() -> HostInfo {
        HostInfo {
            host: "node-a".into(),
            ip: "10.0.0.8".into(),
            ..Default::default()
        }
    }

    fn attachment_record(volume_id: &str, id: &str) -> VolumeAttachmentSpec {
        VolumeAttachmentSpec {
            base: BaseModel {
                id: id.into(),
                ..BaseModel::new("", "")
            },
            volume_id: volume_id.into(),
            host_info: host(),
            status: "attached".into(),
            ..Default::default()
        }
    }

    // -------------------------------------------------------------------------
    // Volumes
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_create_volume_records_placement() {
        let orch = orchestrator(Arc::new(SampleDriver::new())).await;

        let response = orch.handle(create_volume_request("sample", 10)).await;
        assert_eq!(response.status, ResponseStatus::Success);

        let volume: VolumeSpec = response.decode("local").unwrap();
        assert_eq!(volume.pool_id, "p1");
        assert_eq!(volume.profile_id, "pr1");

        let stored = orch.repository().get_volume(&volume.base.id).await.unwrap();
        assert_eq!(stored, volume);

        let pool = orch.repository().get_pool("p1").await.unwrap();
        assert_eq!(pool.used_capacity, 10);
        assert_eq!(pool.free_capacity, 90);
    }

    #[tokio::test]
    async fn test_driver_failure_leaves_state_untouched() {
        let orch = orchestrator(Arc::new(SampleDriver::new())).await;

        let response = orch.handle(create_volume_request("sample", 0)).await;
        assert!(!response.is_success());
        assert_eq!(response.error_kind, Some(ErrorKind::Driver));

        assert!(orch.repository().list_volumes().await.unwrap().is_empty());
        assert_eq!(orch.repository().get_pool("p1").await.unwrap().used_capacity, 0);
    }

    #[tokio::test]
    async fn test_unknown_pool_skips_driver() {
        let driver = Arc::new(SampleDriver::new());
        let orch = orchestrator(driver.clone()).await;

        let mut request = create_volume_request("sample", 1);
        request.pool_id = "p404".into();

        let err = orch.create_volume(&request).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(driver.volume_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_volume_releases_capacity() {
        let driver = Arc::new(SampleDriver::new());
        let orch = orchestrator(driver.clone()).await;
        let volume = orch.create_volume(&create_volume_request("sample", 25)).await.unwrap();

        let request = request(ResourceKind::Volume, Action::Delete, "sample")
            .with_volume_id(volume.base.id.clone());
        let response = orch.handle(request).await;
        assert!(response.is_success());
        assert_eq!(response.message, "Delete volume success");

        assert!(orch
            .repository()
            .get_volume(&volume.base.id)
            .await
            .unwrap_err()
            .is_not_found());
        assert_eq!(driver.volume_count(), 0);
        assert_eq!(orch.repository().get_pool("p1").await.unwrap().used_capacity, 0);
    }

    #[tokio::test]
    async fn test_failed_metadata_write_is_reported() {
        let store = StateStore::new(Arc::new(VolumeWritesFail::default()), DEFAULT_STORE_TIMEOUT);
        let repo = ResourceRepository::new(store);
        let driver = Arc::new(SampleDriver::new());
        let orch = orchestrator_with(repo, driver.clone()).await;

        let err = orch
            .create_volume(&create_volume_request("sample", 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Store);

        // The backend volume exists without a record
        assert_eq!(driver.volume_count(), 1);
        assert!(orch.repository().list_volumes().await.unwrap().is_empty());
    }

    // -------------------------------------------------------------------------
    // Attachments
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_attachment_lifecycle() {
        let orch = orchestrator(Arc::new(SampleDriver::new())).await;
        let volume = orch.create_volume(&create_volume_request("sample", 1)).await.unwrap();
        let volume_id = volume.base.id.clone();

        let create = request(ResourceKind::Attachment, Action::Create, "sample")
            .with_volume_id(volume_id.clone())
            .with_host_info(&host())
            .unwrap();
        let attachment: VolumeAttachmentSpec = orch.handle(create).await.decode("local").unwrap();
        assert_eq!(attachment.volume_id, volume_id);
        assert_eq!(
            orch.repository().get_volume(&volume_id).await.unwrap().status,
            "in-use"
        );

        let mut update = request(ResourceKind::Attachment, Action::Update, "sample")
            .with_volume_id(volume_id.clone())
            .with_host_info(&host())
            .unwrap();
        update.attachment_id = attachment.base.id.clone();
        update.mountpoint = "/mnt/db".into();
        let updated: VolumeAttachmentSpec = orch.handle(update).await.decode("local").unwrap();
        assert_eq!(updated.mountpoint, "/mnt/db");

        let mut delete = request(ResourceKind::Attachment, Action::Delete, "sample")
            .with_volume_id(volume_id.clone());
        delete.attachment_id = attachment.base.id.clone();
        assert!(orch.handle(delete).await.is_success());

        assert!(orch
            .repository()
            .list_attachments(&volume_id)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            orch.repository().get_volume(&volume_id).await.unwrap().status,
            "available"
        );
    }

    #[tokio::test]
    async fn test_detach_of_unattached_volume_still_removes_record() {
        let orch = orchestrator(Arc::new(SampleDriver::new())).await;
        orch.repository()
            .create_attachment("v1", &attachment_record("v1", "a1"))
            .await
            .unwrap();

        let mut delete =
            request(ResourceKind::Attachment, Action::Delete, "sample").with_volume_id("v1");
        delete.attachment_id = "a1".into();

        orch.delete_attachment(&delete).await.unwrap();
        assert!(orch
            .repository()
            .get_attachment("v1", "a1")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_textual_not_in_use_is_benign() {
        let driver = Arc::new(ScriptedDriver::failing_detach(DriverFailure::Backend(
            "The status of volume is not in-use".into(),
        )));
        let orch = orchestrator(driver.clone()).await;
        orch.repository()
            .create_attachment("v1", &attachment_record("v1", "a1"))
            .await
            .unwrap();

        let mut delete =
            request(ResourceKind::Attachment, Action::Delete, "scripted").with_volume_id("v1");
        delete.attachment_id = "a1".into();

        assert!(orch.handle(delete).await.is_success());
        assert_eq!(driver.detach_calls.load(Ordering::SeqCst), 1);
        assert!(orch
            .repository()
            .list_attachments("v1")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_other_detach_failure_keeps_record() {
        let driver = Arc::new(ScriptedDriver::failing_detach(DriverFailure::Backend(
            "iscsi target busy".into(),
        )));
        let orch = orchestrator(driver).await;
        orch.repository()
            .create_attachment("v1", &attachment_record("v1", "a1"))
            .await
            .unwrap();

        let mut delete =
            request(ResourceKind::Attachment, Action::Delete, "scripted").with_volume_id("v1");
        delete.attachment_id = "a1".into();

        let response = orch.handle(delete).await;
        assert!(!response.is_success());
        assert!(response.error.unwrap().contains("iscsi target busy"));
        assert!(orch.repository().get_attachment("v1", "a1").await.is_ok());
    }

    // -------------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_snapshot_lifecycle() {
        let orch = orchestrator(Arc::new(SampleDriver::new())).await;
        let volume = orch.create_volume(&create_volume_request("sample", 4)).await.unwrap();

        let mut create = request(ResourceKind::Snapshot, Action::Create, "sample")
            .with_volume_id(volume.base.id.clone());
        create.snapshot_name = "nightly".into();
        let snapshot: VolumeSnapshotSpec = orch.handle(create).await.decode("local").unwrap();
        assert_eq!(snapshot.size, 4);
        assert_eq!(orch.repository().list_snapshots().await.unwrap().len(), 1);

        let mut get = request(ResourceKind::Snapshot, Action::Get, "sample");
        get.snapshot_id = snapshot.base.id.clone();
        let fetched: VolumeSnapshotSpec = orch.handle(get).await.decode("local").unwrap();
        assert_eq!(fetched.base.name, "nightly");

        let mut delete = request(ResourceKind::Snapshot, Action::Delete, "sample");
        delete.snapshot_id = snapshot.base.id.clone();
        assert!(orch.handle(delete).await.is_success());
        assert!(orch.repository().list_snapshots().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_volume_with_snapshots_not_deleted() {
        let driver = Arc::new(SampleDriver::new());
        let orch = orchestrator(driver.clone()).await;
        let volume = orch.create_volume(&create_volume_request("sample", 4)).await.unwrap();

        let mut create = request(ResourceKind::Snapshot, Action::Create, "sample")
            .with_volume_id(volume.base.id.clone());
        create.snapshot_name = "nightly".into();
        let snapshot = orch.create_snapshot(&create).await.unwrap();

        let delete_volume = request(ResourceKind::Volume, Action::Delete, "sample")
            .with_volume_id(volume.base.id.clone());
        let response = orch.handle(delete_volume.clone()).await;
        assert_eq!(response.error_kind, Some(ErrorKind::Validation));
        assert_eq!(driver.volume_count(), 1);
        assert!(orch.repository().get_volume(&volume.base.id).await.is_ok());

        let mut delete_snapshot = request(ResourceKind::Snapshot, Action::Delete, "sample");
        delete_snapshot.snapshot_id = snapshot.base.id.clone();
        orch.delete_snapshot(&delete_snapshot).await.unwrap();

        orch.delete_volume(&delete_volume).await.unwrap();
        assert_eq!(driver.volume_count(), 0);
    }

    // -------------------------------------------------------------------------
    // Request validation
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_unknown_driver_is_unavailable() {
        let orch = orchestrator(Arc::new(SampleDriver::new())).await;
        let response = orch.handle(create_volume_request("ceph", 1)).await;
        assert_eq!(response.error_kind, Some(ErrorKind::Unavailable));
    }

    #[tokio::test]
    async fn test_malformed_descriptors_are_validation_errors() {
        let orch = orchestrator(Arc::new(SampleDriver::new())).await;

        let mut bad_dock = create_volume_request("sample", 1);
        bad_dock.dock_info = "{not json".into();
        assert_eq!(orch.handle(bad_dock).await.error_kind, Some(ErrorKind::Validation));

        let mut bad_host =
            request(ResourceKind::Attachment, Action::Create, "sample").with_volume_id("v1");
        bad_host.host_info = "[]".into();
        assert_eq!(orch.handle(bad_host).await.error_kind, Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_unsupported_action() {
        let orch = orchestrator(Arc::new(SampleDriver::new())).await;
        let response = orch
            .handle(request(ResourceKind::Volume, Action::Update, "sample"))
            .await;
        assert_eq!(response.error_kind, Some(ErrorKind::Validation));
    }
}
