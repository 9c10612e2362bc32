use super::{require_id, ResourceRepository};
use crate::domain::model::{ExtraSpec, ProfileSpec};
use crate::error::{Error, Result};

const KIND: &str = "profile";

impl ResourceRepository {
    /// Store a new profile.
    ///
    /// A second profile named "default" would make default resolution
    /// ambiguous, so it is rejected.
    pub async fn create_profile(&self, profile: &ProfileSpec) -> Result<ProfileSpec> {
        require_id(KIND, &profile.base.id)?;

        if profile.is_default() {
            self.ensure_no_other_default(&profile.base.id).await?;
        }

        self.put_profile(profile).await
    }

    pub async fn get_profile(&self, id: &str) -> Result<ProfileSpec> {
        self.get_record(KIND, id, &self.keys.profile(id)).await
    }

    pub async fn list_profiles(&self) -> Result<Vec<ProfileSpec>> {
        self.list_records(KIND, &self.keys.profiles()).await
    }

    /// Apply the non-empty name and description of `input`.
    ///
    /// Extra properties cannot be changed here; use
    /// [`add_extra_properties`](Self::add_extra_properties) and
    /// [`remove_extra_property`](Self::remove_extra_property).
    pub async fn update_profile(&self, id: &str, input: &ProfileSpec) -> Result<ProfileSpec> {
        let mut profile = self.get_profile(id).await?;
        profile.base.merge_from(&input.base);
        if !input.extra.is_empty() {
            return Err(Error::Validation(
                "Failed to update extra properties: use the extras operations".into(),
            ));
        }
        if profile.is_default() {
            self.ensure_no_other_default(id).await?;
        }
        profile.base.touch();

        self.update_record(KIND, &self.keys.profile(id), &profile)
            .await?;
        Ok(profile)
    }

    pub async fn delete_profile(&self, id: &str) -> Result<()> {
        self.delete_record(KIND, &self.keys.profile(id)).await
    }

    /// Merge `extra` into the profile's extra properties
    pub async fn add_extra_properties(&self, id: &str, extra: ExtraSpec) -> Result<ExtraSpec> {
        let mut profile = self.get_profile(id).await?;
        profile.extra.extend(extra);
        profile.base.touch();

        let profile = self.put_profile(&profile).await?;
        Ok(profile.extra)
    }

    pub async fn list_extra_properties(&self, id: &str) -> Result<ExtraSpec> {
        Ok(self.get_profile(id).await?.extra)
    }

    /// Drop `key` from the profile's extra properties
    pub async fn remove_extra_property(&self, id: &str, key: &str) -> Result<()> {
        let mut profile = self.get_profile(id).await?;
        profile.extra.remove(key);
        profile.base.touch();

        self.put_profile(&profile).await?;
        Ok(())
    }

    /// Fail when a profile other than `id` is already named "default"
    async fn ensure_no_other_default(&self, id: &str) -> Result<()> {
        let clash = self
            .list_profiles()
            .await?
            .into_iter()
            .any(|p| p.is_default() && p.base.id != id);
        if clash {
            return Err(Error::Validation("a profile named \"default\" already exists".into()));
        }
        Ok(())
    }

    async fn put_profile(&self, profile: &ProfileSpec) -> Result<ProfileSpec> {
        self.create_record(KIND, &self.keys.profile(&profile.base.id), profile)
            .await?;
        Ok(profile.clone())
    }
}
