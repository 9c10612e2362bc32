use super::{require_id, ResourceRepository};
use crate::domain::model::VolumeSnapshotSpec;
use crate::error::Result;

const KIND: &str = "snapshot";

impl ResourceRepository {
    pub async fn create_snapshot(
        &self,
        snapshot: &VolumeSnapshotSpec,
    ) -> Result<VolumeSnapshotSpec> {
        require_id(KIND, &snapshot.base.id)?;
        self.create_record(KIND, &self.keys.snapshot(&snapshot.base.id), snapshot)
            .await?;
        Ok(snapshot.clone())
    }

    pub async fn get_snapshot(&self, id: &str) -> Result<VolumeSnapshotSpec> {
        self.get_record(KIND, id, &self.keys.snapshot(id)).await
    }

    /// Every snapshot, regardless of the volume it was taken from
    pub async fn list_snapshots(&self) -> Result<Vec<VolumeSnapshotSpec>> {
        self.list_records(KIND, &self.keys.snapshots()).await
    }

    /// Apply the non-empty name, description and status of `input`
    pub async fn update_snapshot(
        &self,
        id: &str,
        input: &VolumeSnapshotSpec,
    ) -> Result<VolumeSnapshotSpec> {
        let mut snapshot = self.get_snapshot(id).await?;
        snapshot.base.merge_from(&input.base);
        if !input.status.is_empty() {
            snapshot.status = input.status.clone();
        }
        snapshot.base.touch();
        self.update_record(KIND, &self.keys.snapshot(id), &snapshot)
            .await?;
        Ok(snapshot)
    }

    pub async fn delete_snapshot(&self, id: &str) -> Result<()> {
        self.delete_record(KIND, &self.keys.snapshot(id)).await
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::model::{BaseModel, VolumeSnapshotSpec};
    use crate::repository::ResourceRepository;

    fn snapshot(id: &str, volume_id: &str) -> VolumeSnapshotSpec {
        VolumeSnapshotSpec {
            base: BaseModel {
                id: id.into(),
                name: format!("snap-{}", id),
                ..BaseModel::new("", "")
            },
            volume_id: volume_id.into(),
            size: 10,
            status: "available".into(),
        }
    }

    #[tokio::test]
    async fn test_snapshots_listed_across_volumes() {
        let repo = ResourceRepository::in_memory();
        repo.create_snapshot(&snapshot("s1", "v1")).await.unwrap();
        repo.create_snapshot(&snapshot("s2", "v2")).await.unwrap();

        let all = repo.list_snapshots().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(repo.get_snapshot("s2").await.unwrap().volume_id, "v2");
    }

    #[tokio::test]
    async fn test_snapshot_update_and_delete() {
        let repo = ResourceRepository::in_memory();
        repo.create_snapshot(&snapshot("s1", "v1")).await.unwrap();

        let mut input = VolumeSnapshotSpec::default();
        input.base.description = "before upgrade".into();
        let updated = repo.update_snapshot("s1", &input).await.unwrap();
        assert_eq!(updated.base.description, "before upgrade");
        assert_eq!(updated.status, "available");

        repo.delete_snapshot("s1").await.unwrap();
        assert!(repo.get_snapshot("s1").await.unwrap_err().is_not_found());
    }
}
