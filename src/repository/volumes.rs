use super::{require_id, ResourceRepository};
use crate::domain::model::VolumeSpec;
use crate::error::Result;

const KIND: &str = "volume";

impl ResourceRepository {
    /// Store a volume record, overwriting any record with the same id
    pub async fn create_volume(&self, volume: &VolumeSpec) -> Result<VolumeSpec> {
        require_id(KIND, &volume.base.id)?;
        self.create_record(KIND, &self.keys.volume(&volume.base.id), volume)
            .await?;
        Ok(volume.clone())
    }

    pub async fn get_volume(&self, id: &str) -> Result<VolumeSpec> {
        self.get_record(KIND, id, &self.keys.volume(id)).await
    }

    pub async fn list_volumes(&self) -> Result<Vec<VolumeSpec>> {
        self.list_records(KIND, &self.keys.volumes()).await
    }

    /// Apply the non-empty name, description and status of `input`
    pub async fn update_volume(&self, id: &str, input: &VolumeSpec) -> Result<VolumeSpec> {
        let mut volume = self.get_volume(id).await?;
        volume.base.merge_from(&input.base);
        if !input.status.is_empty() {
            volume.status = input.status.clone();
        }
        volume.base.touch();
        self.update_record(KIND, &self.keys.volume(id), &volume)
            .await?;
        Ok(volume)
    }

    pub async fn delete_volume(&self, id: &str) -> Result<()> {
        self.delete_record(KIND, &self.keys.volume(id)).await
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::model::{BaseModel, VolumeSpec};
    use crate::repository::ResourceRepository;

    fn volume(id: &str) -> VolumeSpec {
        VolumeSpec {
            base: BaseModel {
                id: id.into(),
                name: "db-data".into(),
                ..BaseModel::new("", "")
            },
            size: 10,
            pool_id: "p1".into(),
            profile_id: "pr1".into(),
            status: "available".into(),
        }
    }

    #[tokio::test]
    async fn test_volume_round_trip() {
        let repo = ResourceRepository::in_memory();
        repo.create_volume(&volume("v1")).await.unwrap();
        repo.create_volume(&volume("v2")).await.unwrap();

        let fetched = repo.get_volume("v1").await.unwrap();
        assert_eq!(fetched.size, 10);
        assert_eq!(fetched.pool_id, "p1");
        assert_eq!(repo.list_volumes().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_volume_status() {
        let repo = ResourceRepository::in_memory();
        repo.create_volume(&volume("v1")).await.unwrap();

        let input = VolumeSpec {
            status: "in-use".into(),
            size: 999,
            ..Default::default()
        };
        let updated = repo.update_volume("v1", &input).await.unwrap();
        assert_eq!(updated.status, "in-use");
        assert_eq!(updated.size, 10);
        assert_eq!(updated.base.name, "db-data");
    }

    #[tokio::test]
    async fn test_deleted_volume_is_gone() {
        let repo = ResourceRepository::in_memory();
        repo.create_volume(&volume("v1")).await.unwrap();
        repo.delete_volume("v1").await.unwrap();

        assert!(repo.get_volume("v1").await.unwrap_err().is_not_found());
        assert!(repo.list_volumes().await.unwrap().is_empty());
    }
}
