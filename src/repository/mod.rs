//! Resource Repository
//!
//! Typed CRUD for every resource kind on top of the [`StateStore`]. The
//! repository owns the key layout and the JSON encoding of records:
//!
//! ```text
//! <ns>/docks/<id>
//! <ns>/pools/<id>
//! <ns>/profiles/<id>
//! <ns>/volumes/<id>
//! <ns>/volume/<volume-id>/attachments/<id>
//! <ns>/volume/snapshots/<id>
//! ```
//!
//! Updates are read-modify-write: only the fields the caller supplied
//! (non-empty) are applied to the stored record.

mod attachments;
mod docks;
mod pools;
mod profiles;
mod snapshots;
mod volumes;

use crate::error::{Error, Result};
use crate::store::StateStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

/// Namespace every key lives under
pub const DEFAULT_NAMESPACE: &str = "/api/v1alpha1/block";

// =============================================================================
// Key Space
// =============================================================================

/// Builds the hierarchical keys of each resource kind
#[derive(Debug, Clone)]
pub struct KeySpace {
    namespace: String,
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl KeySpace {
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            namespace: namespace.trim_end_matches('/').to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn docks(&self) -> String {
        format!("{}/docks/", self.namespace)
    }

    pub fn dock(&self, id: &str) -> String {
        format!("{}{}", self.docks(), id)
    }

    pub fn pools(&self) -> String {
        format!("{}/pools/", self.namespace)
    }

    pub fn pool(&self, id: &str) -> String {
        format!("{}{}", self.pools(), id)
    }

    pub fn profiles(&self) -> String {
        format!("{}/profiles/", self.namespace)
    }

    pub fn profile(&self, id: &str) -> String {
        format!("{}{}", self.profiles(), id)
    }

    pub fn volumes(&self) -> String {
        format!("{}/volumes/", self.namespace)
    }

    pub fn volume(&self, id: &str) -> String {
        format!("{}{}", self.volumes(), id)
    }

    pub fn attachments(&self, volume_id: &str) -> String {
        format!("{}/volume/{}/attachments/", self.namespace, volume_id)
    }

    pub fn attachment(&self, volume_id: &str, id: &str) -> String {
        format!("{}{}", self.attachments(volume_id), id)
    }

    pub fn snapshots(&self) -> String {
        format!("{}/volume/snapshots/", self.namespace)
    }

    pub fn snapshot(&self, id: &str) -> String {
        format!("{}{}", self.snapshots(), id)
    }
}

// =============================================================================
// Resource Repository
// =============================================================================

/// Typed access to the records of every resource kind
pub struct ResourceRepository {
    store: Arc<StateStore>,
    keys: KeySpace,
}

impl ResourceRepository {
    /// Create a repository over `store` using the default namespace
    pub fn new(store: Arc<StateStore>) -> Arc<Self> {
        Self::with_keys(store, KeySpace::default())
    }

    pub fn with_keys(store: Arc<StateStore>, keys: KeySpace) -> Arc<Self> {
        Arc::new(Self { store, keys })
    }

    /// Repository over a fresh in-memory store
    pub fn in_memory() -> Arc<Self> {
        Self::new(StateStore::in_memory())
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    // -------------------------------------------------------------------------
    // Record helpers
    // -------------------------------------------------------------------------

    async fn create_record<T: Serialize>(&self, kind: &str, key: &str, record: &T) -> Result<()> {
        let body = serde_json::to_string(record)?;
        self.store.create(key, &body).await.map_err(|e| {
            error!("When create {} in db: {}", kind, e);
            e
        })
    }

    async fn update_record<T: Serialize>(&self, kind: &str, key: &str, record: &T) -> Result<()> {
        let body = serde_json::to_string(record)?;
        self.store.update(key, &body).await.map_err(|e| {
            error!("When update {} in db: {}", kind, e);
            e
        })
    }

    async fn get_record<T: DeserializeOwned>(&self, kind: &str, id: &str, key: &str) -> Result<T> {
        let body = self.store.get(key).await.map_err(|e| match e {
            Error::NotFound { .. } => Error::not_found(kind, id),
            other => {
                error!("When get {} in db: {}", kind, other);
                other
            }
        })?;

        serde_json::from_str(&body).map_err(|e| {
            error!("When parsing {} {} in db: {}", kind, id, e);
            Error::from(e)
        })
    }

    async fn list_records<T: DeserializeOwned>(&self, kind: &str, prefix: &str) -> Result<Vec<T>> {
        let bodies = self.store.list(prefix).await.map_err(|e| {
            error!("When list {} in db: {}", kind, e);
            e
        })?;

        bodies
            .iter()
            .map(|body| {
                serde_json::from_str(body).map_err(|e| {
                    error!("When parsing {} in db: {}", kind, e);
                    Error::from(e)
                })
            })
            .collect()
    }

    async fn delete_record(&self, kind: &str, key: &str) -> Result<()> {
        self.store.delete(key).await.map_err(|e| {
            error!("When delete {} in db: {}", kind, e);
            e
        })
    }
}

fn require_id(kind: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::Validation(format!("{} id must not be empty", kind)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let keys = KeySpace::default();
        assert_eq!(keys.dock("d1"), "/api/v1alpha1/block/docks/d1");
        assert_eq!(keys.pool("p1"), "/api/v1alpha1/block/pools/p1");
        assert_eq!(keys.profile("x"), "/api/v1alpha1/block/profiles/x");
        assert_eq!(keys.volume("v1"), "/api/v1alpha1/block/volumes/v1");
        assert_eq!(
            keys.attachment("v1", "a1"),
            "/api/v1alpha1/block/volume/v1/attachments/a1"
        );
        assert_eq!(keys.snapshot("s1"), "/api/v1alpha1/block/volume/snapshots/s1");
    }

    #[test]
    fn test_custom_namespace_trims_slash() {
        let keys = KeySpace::new("/sds/");
        assert_eq!(keys.volumes(), "/sds/volumes/");
        assert_eq!(keys.namespace(), "/sds");
    }
}
