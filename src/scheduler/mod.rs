//! Scheduler
//!
//! Policy resolution for incoming requests:
//! - profile id (or the default profile) -> [`ProfileSpec`]
//! - profile tags -> first pool advertising every tag as "true"
//! - pool -> owning dock
//! - volume -> pool -> dock
//!
//! Every resolution is a linear scan over the full listing returned by the
//! repository. Pool selection is first-fit in listing order.

use crate::domain::model::{DockSpec, ExtraSpec, PoolSpec, ProfileSpec, DEFAULT_PROFILE_NAME};
use crate::error::{Error, Result, ResultExt};
use crate::repository::ResourceRepository;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

// =============================================================================
// Placement
// =============================================================================

/// Where a new resource should be created
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub profile: ProfileSpec,
    pub pool: PoolSpec,
    pub dock: DockSpec,
}

// =============================================================================
// Scheduler
// =============================================================================

/// Resolves profiles, pools and docks from shared state
#[derive(Clone)]
pub struct Scheduler {
    repo: Arc<ResourceRepository>,
}

impl Scheduler {
    pub fn new(repo: Arc<ResourceRepository>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Arc<ResourceRepository> {
        &self.repo
    }

    /// Resolve a profile by id; an empty id selects the default profile.
    ///
    /// Without an id, exactly one profile named "default" must exist:
    /// none is `NotFound`, several is a `Validation` error.
    pub async fn resolve_profile(&self, profile_id: &str) -> Result<ProfileSpec> {
        if !profile_id.is_empty() {
            return self.repo.get_profile(profile_id).await;
        }

        let mut defaults: Vec<ProfileSpec> = self
            .repo
            .list_profiles()
            .await?
            .into_iter()
            .filter(ProfileSpec::is_default)
            .collect();

        match defaults.len() {
            0 => Err(Error::not_found("profile", DEFAULT_PROFILE_NAME)),
            1 => Ok(defaults.remove(0)),
            n => {
                warn!("{} profiles are named {}", n, DEFAULT_PROFILE_NAME);
                Err(Error::Validation(format!(
                    "{} profiles are named \"{}\"; the default is ambiguous",
                    n, DEFAULT_PROFILE_NAME
                )))
            }
        }
    }

    /// First pool whose parameters map every tag in `tags` to "true"
    pub async fn resolve_supporting_pool(&self, tags: &ExtraSpec) -> Result<PoolSpec> {
        let pools = self.repo.list_pools().await?;

        match pools.into_iter().find(|pool| pool.supports(tags.keys())) {
            Some(pool) => {
                debug!("Pool {} supports tags {:?}", pool.base.id, tags.keys());
                Ok(pool)
            }
            None => Err(Error::NoSupportedPool {
                tags: tags.keys().cloned().collect::<Vec<_>>().join(", "),
            }),
        }
    }

    /// The dock that owns `pool`
    pub async fn resolve_dock_by_pool(&self, pool: &PoolSpec) -> Result<DockSpec> {
        self.repo
            .list_docks()
            .await?
            .into_iter()
            .find(|dock| dock.base.id == pool.dock_id)
            .ok_or_else(|| Error::NoSupportedDock {
                pool_id: pool.base.id.clone(),
            })
    }

    /// The dock that hosts `volume_id`, through the volume's pool
    pub async fn resolve_dock_by_volume(&self, volume_id: &str) -> Result<DockSpec> {
        let volume = self.repo.get_volume(volume_id).await?;
        let pool = self
            .repo
            .get_pool(&volume.pool_id)
            .await
            .with_context(|| format!("resolving pool of volume {}", volume_id))?;

        self.resolve_dock_by_pool(&pool).await
    }

    /// Resolve profile, pool and dock for a new volume
    pub async fn schedule(&self, profile_id: &str) -> Result<Placement> {
        let profile = self.resolve_profile(profile_id).await?;
        let pool = self
            .resolve_supporting_pool(&profile.extra)
            .await
            .with_context(|| format!("scheduling with profile {}", profile.base.id))?;
        let dock = self.resolve_dock_by_pool(&pool).await?;

        info!(
            "Scheduled profile {} onto pool {} on dock {}",
            profile.base.id, pool.base.id, dock.base.id
        );
        Ok(Placement { profile, pool, dock })
    }
}
