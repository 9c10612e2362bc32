//! Sample Driver
//!
//! Keeps volumes, exports and snapshots in process memory. Used by
//! standalone deployments and tests; it enforces the same preconditions a
//! real backend would (no delete while attached, no double attach).

use crate::domain::model::{
    BaseModel, HostInfo, VolumeAttachmentSpec, VolumeSnapshotSpec, VolumeSpec,
};
use crate::domain::ports::VolumeDriver;
use crate::error::{DriverFailure, Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const SAMPLE_DRIVER_NAME: &str = "sample";

const STATUS_AVAILABLE: &str = "available";
const STATUS_IN_USE: &str = "in-use";
const STATUS_ATTACHED: &str = "attached";

#[derive(Default)]
struct SampleState {
    volumes: BTreeMap<String, VolumeSpec>,
    /// Active export per volume id
    exports: BTreeMap<String, VolumeAttachmentSpec>,
    snapshots: BTreeMap<String, VolumeSnapshotSpec>,
}

/// In-memory volume driver
#[derive(Default)]
pub struct SampleDriver {
    state: RwLock<SampleState>,
}

impl SampleDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn volume_count(&self) -> usize {
        self.state.read().volumes.len()
    }

    pub fn is_attached(&self, volume_id: &str) -> bool {
        self.state.read().exports.contains_key(volume_id)
    }

    fn invalid(operation: &'static str, msg: impl Into<String>) -> Error {
        Error::driver(
            SAMPLE_DRIVER_NAME,
            operation,
            DriverFailure::InvalidArgument(msg.into()),
        )
    }
}

#[async_trait]
impl VolumeDriver for SampleDriver {
    fn driver_name(&self) -> &str {
        SAMPLE_DRIVER_NAME
    }

    async fn create_volume(&self, name: &str, description: &str, size: u64) -> Result<VolumeSpec> {
        if size == 0 {
            return Err(Self::invalid("create volume", "size must be at least 1 GiB"));
        }

        let volume = VolumeSpec {
            base: BaseModel::new(name, description),
            size,
            status: STATUS_AVAILABLE.to_string(),
            ..Default::default()
        };
        self.state
            .write()
            .volumes
            .insert(volume.base.id.clone(), volume.clone());

        info!("Sample driver created volume {} ({} GiB)", volume.base.id, size);
        Ok(volume)
    }

    async fn get_volume(&self, volume_id: &str) -> Result<VolumeSpec> {
        self.state
            .read()
            .volumes
            .get(volume_id)
            .cloned()
            .ok_or_else(|| Error::not_found("volume", volume_id))
    }

    async fn delete_volume(&self, volume_id: &str) -> Result<()> {
        let mut state = self.state.write();
        if state.exports.contains_key(volume_id) {
            return Err(Self::invalid("delete volume", "volume is still attached"));
        }
        state
            .volumes
            .remove(volume_id)
            .ok_or_else(|| Error::not_found("volume", volume_id))?;

        debug!("Sample driver deleted volume {}", volume_id);
        Ok(())
    }

    async fn create_attachment(
        &self,
        volume_id: &str,
        do_local_attach: bool,
        multipath: bool,
        host: &HostInfo,
    ) -> Result<VolumeAttachmentSpec> {
        let mut state = self.state.write();
        let volume = state
            .volumes
            .get_mut(volume_id)
            .ok_or_else(|| Error::not_found("volume", volume_id))?;
        if volume.status == STATUS_IN_USE {
            return Err(Self::invalid("create attachment", "volume is already attached"));
        }
        volume.status = STATUS_IN_USE.to_string();
        volume.base.touch();

        let attachment = VolumeAttachmentSpec {
            base: BaseModel::new(format!("{}-export", volume_id), ""),
            volume_id: volume_id.to_string(),
            host_info: host.clone(),
            do_local_attach,
            multipath,
            status: STATUS_ATTACHED.to_string(),
            connection_info: BTreeMap::from([
                ("driverVolumeType".to_string(), "iscsi".to_string()),
                (
                    "targetIqn".to_string(),
                    format!("iqn.2017-10.io.sds:{}", volume_id),
                ),
                ("targetLun".to_string(), "1".to_string()),
            ]),
            ..Default::default()
        };
        state
            .exports
            .insert(volume_id.to_string(), attachment.clone());

        info!("Sample driver exported volume {} to {}", volume_id, host.host);
        Ok(attachment)
    }

    async fn update_attachment(&self, volume_id: &str, host: &str, mountpoint: &str) -> Result<()> {
        let mut state = self.state.write();
        let export = state.exports.get_mut(volume_id).ok_or_else(|| {
            Error::driver(SAMPLE_DRIVER_NAME, "update attachment", DriverFailure::NotInUse)
        })?;

        if !host.is_empty() && !export.host_info.host.is_empty() && export.host_info.host != host {
            return Err(Self::invalid(
                "update attachment",
                format!("volume is exported to {}, not {}", export.host_info.host, host),
            ));
        }
        export.mountpoint = mountpoint.to_string();
        Ok(())
    }

    async fn delete_attachment(&self, volume_id: &str) -> Result<()> {
        let mut state = self.state.write();
        if state.exports.remove(volume_id).is_none() {
            return Err(Error::driver(
                SAMPLE_DRIVER_NAME,
                "delete attachment",
                DriverFailure::NotInUse,
            ));
        }
        if let Some(volume) = state.volumes.get_mut(volume_id) {
            volume.status = STATUS_AVAILABLE.to_string();
            volume.base.touch();
        }

        debug!("Sample driver removed export of volume {}", volume_id);
        Ok(())
    }

    async fn create_snapshot(
        &self,
        name: &str,
        volume_id: &str,
        description: &str,
    ) -> Result<VolumeSnapshotSpec> {
        let mut state = self.state.write();
        let size = state
            .volumes
            .get(volume_id)
            .map(|v| v.size)
            .ok_or_else(|| Error::not_found("volume", volume_id))?;

        let snapshot = VolumeSnapshotSpec {
            base: BaseModel::new(name, description),
            volume_id: volume_id.to_string(),
            size,
            status: STATUS_AVAILABLE.to_string(),
        };
        state
            .snapshots
            .insert(snapshot.base.id.clone(), snapshot.clone());
        Ok(snapshot)
    }

    async fn get_snapshot(&self, snapshot_id: &str) -> Result<VolumeSnapshotSpec> {
        self.state
            .read()
            .snapshots
            .get(snapshot_id)
            .cloned()
            .ok_or_else(|| Error::not_found("snapshot", snapshot_id))
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        self.state
            .write()
            .snapshots
            .remove(snapshot_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("snapshot", snapshot_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn host() -> HostInfo {
        HostInfo {
            host: "node-a".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_volume_lifecycle() {
        let driver = SampleDriver::new();
        let volume = driver.create_volume("data", "", 5).await.unwrap();
        assert_eq!(volume.status, "available");
        assert_eq!(driver.get_volume(&volume.base.id).await.unwrap().size, 5);

        driver.delete_volume(&volume.base.id).await.unwrap();
        assert_eq!(driver.volume_count(), 0);
        assert!(driver.get_volume(&volume.base.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_zero_size_rejected() {
        let driver = SampleDriver::new();
        assert_matches!(
            driver.create_volume("data", "", 0).await,
            Err(Error::Driver {
                failure: DriverFailure::InvalidArgument(_),
                ..
            })
        );
    }

    #[tokio::test]
    async fn test_attach_detach() {
        let driver = SampleDriver::new();
        let volume = driver.create_volume("data", "", 1).await.unwrap();
        let id = volume.base.id.as_str();

        let export = driver.create_attachment(id, false, true, &host()).await.unwrap();
        assert!(export.connection_info.contains_key("targetIqn"));
        assert!(driver.is_attached(id));
        assert!(driver.create_attachment(id, false, false, &host()).await.is_err());
        assert!(driver.delete_volume(id).await.is_err());

        driver.update_attachment(id, "node-a", "/mnt/data").await.unwrap();
        assert!(driver.update_attachment(id, "node-b", "/mnt/x").await.is_err());

        driver.delete_attachment(id).await.unwrap();
        assert_eq!(driver.get_volume(id).await.unwrap().status, "available");

        let err = driver.delete_attachment(id).await.unwrap_err();
        assert!(err.is_not_in_use());
    }

    #[tokio::test]
    async fn test_snapshot_takes_volume_size() {
        let driver = SampleDriver::new();
        let volume = driver.create_volume("data", "", 8).await.unwrap();

        let snapshot = driver
            .create_snapshot("nightly", &volume.base.id, "")
            .await
            .unwrap();
        assert_eq!(snapshot.size, 8);
        assert_eq!(driver.get_snapshot(&snapshot.base.id).await.unwrap(), snapshot);

        driver.delete_snapshot(&snapshot.base.id).await.unwrap();
        assert!(driver.delete_snapshot(&snapshot.base.id).await.is_err());
        assert!(driver.create_snapshot("x", "missing", "").await.is_err());
    }
}
