use super::{require_id, ResourceRepository};
use crate::domain::model::DockSpec;
use crate::error::Result;

const KIND: &str = "dock";

impl ResourceRepository {
    /// Store a dock record, overwriting any record with the same id
    pub async fn create_dock(&self, dock: &DockSpec) -> Result<DockSpec> {
        require_id(KIND, &dock.base.id)?;
        self.create_record(KIND, &self.keys.dock(&dock.base.id), dock)
            .await?;
        Ok(dock.clone())
    }

    pub async fn get_dock(&self, id: &str) -> Result<DockSpec> {
        self.get_record(KIND, id, &self.keys.dock(id)).await
    }

    pub async fn list_docks(&self) -> Result<Vec<DockSpec>> {
        self.list_records(KIND, &self.keys.docks()).await
    }

    /// Apply the non-empty name and description of `input`
    pub async fn update_dock(&self, id: &str, input: &DockSpec) -> Result<DockSpec> {
        let mut dock = self.get_dock(id).await?;
        dock.base.merge_from(&input.base);
        dock.base.touch();
        self.update_record(KIND, &self.keys.dock(id), &dock).await?;
        Ok(dock)
    }

    pub async fn delete_dock(&self, id: &str) -> Result<()> {
        self.delete_record(KIND, &self.keys.dock(id)).await
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::model::{BaseModel, DockSpec};
    use crate::repository::ResourceRepository;

    fn dock(id: &str) -> DockSpec {
        DockSpec {
            base: BaseModel {
                id: id.into(),
                name: format!("{}-name", id),
                description: "rack 4".into(),
                ..BaseModel::new("", "")
            },
            endpoint: "127.0.0.1:50050".into(),
            driver_name: "sample".into(),
        }
    }

    #[tokio::test]
    async fn test_dock_round_trip() {
        let repo = ResourceRepository::in_memory();
        let created = repo.create_dock(&dock("d1")).await.unwrap();
        assert_eq!(repo.get_dock("d1").await.unwrap(), created);
        assert_eq!(repo.list_docks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_dock_is_partial() {
        let repo = ResourceRepository::in_memory();
        repo.create_dock(&dock("d1")).await.unwrap();

        let mut input = DockSpec::default();
        input.base.description = "rack 7".into();
        input.endpoint = "ignored:1".into();

        let updated = repo.update_dock("d1", &input).await.unwrap();
        assert_eq!(updated.base.name, "d1-name");
        assert_eq!(updated.base.description, "rack 7");
        assert_eq!(updated.endpoint, "127.0.0.1:50050");
        assert!(updated.base.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_dock_is_not_found() {
        let repo = ResourceRepository::in_memory();
        let err = repo.get_dock("nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("dock"));
    }
}
