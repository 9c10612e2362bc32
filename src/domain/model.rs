//! Resource records stored in the shared state store
//!
//! Every record is persisted as a whole camelCase JSON document. The
//! common identity fields live in [`BaseModel`] and are flattened into each
//! record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the profile resolved when a request carries no profile id
pub const DEFAULT_PROFILE_NAME: &str = "default";

/// Profile extra properties: tag requirement -> arbitrary JSON value
pub type ExtraSpec = BTreeMap<String, serde_json::Value>;

// =============================================================================
// Base Model
// =============================================================================

/// Identity fields shared by every resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseModel {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BaseModel {
    /// Fresh identity with a random UUID and the current timestamp
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            created_at: Some(Utc::now()),
            updated_at: None,
        }
    }

    /// Apply the non-empty name/description from `input`
    pub fn merge_from(&mut self, input: &BaseModel) {
        if !input.name.is_empty() {
            self.name = input.name.clone();
        }
        if !input.description.is_empty() {
            self.description = input.description.clone();
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

// =============================================================================
// Dock
// =============================================================================

/// An execution node hosting one storage driver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockSpec {
    #[serde(flatten)]
    pub base: BaseModel,
    /// Address of the dock's remote-call endpoint (host:port)
    #[serde(default)]
    pub endpoint: String,
    /// Driver registered on the dock
    #[serde(default)]
    pub driver_name: String,
}

// =============================================================================
// Pool
// =============================================================================

/// A slice of backend capacity exposed by a dock
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSpec {
    #[serde(flatten)]
    pub base: BaseModel,
    /// Owning dock
    #[serde(default)]
    pub dock_id: String,
    /// Total capacity in GiB
    #[serde(default)]
    pub total_capacity: u64,
    /// Unallocated capacity in GiB
    #[serde(default)]
    pub free_capacity: u64,
    /// Allocated capacity in GiB
    #[serde(default)]
    pub used_capacity: u64,
    /// Capability tags; only the literal "true" marks a tag as supported
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl PoolSpec {
    /// Recompute `free_capacity` from the total and used figures
    pub fn refresh_free_capacity(&mut self) {
        self.free_capacity = self.total_capacity.saturating_sub(self.used_capacity);
    }

    /// True if every requested tag is present with the value "true"
    pub fn supports<'a, I>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        tags.into_iter()
            .all(|tag| self.parameters.get(tag).map(String::as_str) == Some("true"))
    }
}

// =============================================================================
// Profile
// =============================================================================

/// Administrator-defined placement policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSpec {
    #[serde(flatten)]
    pub base: BaseModel,
    /// Tag requirements; the keys are matched against pool parameters
    #[serde(default)]
    pub extra: ExtraSpec,
}

impl ProfileSpec {
    pub fn is_default(&self) -> bool {
        self.base.name == DEFAULT_PROFILE_NAME
    }
}

// =============================================================================
// Volume
// =============================================================================

/// A logical storage unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    #[serde(flatten)]
    pub base: BaseModel,
    /// Size in GiB
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub pool_id: String,
    #[serde(default)]
    pub profile_id: String,
    #[serde(default)]
    pub status: String,
}

// =============================================================================
// Attachment
// =============================================================================

/// Host a volume is exported to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub initiator: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub os_type: String,
}

/// Binding of a volume to a host mountpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeAttachmentSpec {
    #[serde(flatten)]
    pub base: BaseModel,
    #[serde(default)]
    pub volume_id: String,
    #[serde(default)]
    pub mountpoint: String,
    #[serde(default)]
    pub host_info: HostInfo,
    #[serde(default)]
    pub do_local_attach: bool,
    #[serde(default)]
    pub multipath: bool,
    #[serde(default)]
    pub status: String,
    /// Driver-specific connection data (target, lun, ...)
    #[serde(default)]
    pub connection_info: BTreeMap<String, String>,
}

// =============================================================================
// Snapshot
// =============================================================================

/// Point-in-time copy of a volume
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotSpec {
    #[serde(flatten)]
    pub base: BaseModel,
    #[serde(default)]
    pub volume_id: String,
    /// Size in GiB
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub status: String,
}

// =============================================================================
// API Version
// =============================================================================

/// Lifecycle state of a northbound API version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VersionStatus {
    Current,
    Supported,
    Deprecated,
}

/// Entry of the API version catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSpec {
    pub name: String,
    pub description: String,
    pub status: VersionStatus,
    pub updated_at: String,
}

impl VersionSpec {
    fn known(name: &str, description: &str, status: VersionStatus, updated_at: &str) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            status,
            updated_at: updated_at.into(),
        }
    }
}

/// Every API version the control plane advertises
pub fn known_versions() -> Vec<VersionSpec> {
    vec![
        VersionSpec::known(
            "v1alpha",
            "v1alpha version",
            VersionStatus::Deprecated,
            "2017-04-10T14:36:58.014Z",
        ),
        VersionSpec::known(
            "v1beta1",
            "first v1beta version",
            VersionStatus::Current,
            "2017-06-10T14:36:58.014Z",
        ),
        VersionSpec::known(
            "v1beta2",
            "second v1beta version",
            VersionStatus::Supported,
            "2017-07-10T14:36:58.014Z",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_tag_matching() {
        let mut pool = PoolSpec::default();
        pool.parameters.insert("ssd".into(), "true".into());
        pool.parameters.insert("thin".into(), "false".into());
        pool.parameters.insert("dedupe".into(), "TRUE".into());

        let ssd = vec!["ssd".to_string()];
        let thin = vec!["thin".to_string()];
        let dedupe = vec!["dedupe".to_string()];
        let missing = vec!["ssd".to_string(), "compress".to_string()];
        let none: Vec<String> = Vec::new();

        assert!(pool.supports(&ssd));
        assert!(!pool.supports(&thin));
        assert!(!pool.supports(&dedupe));
        assert!(!pool.supports(&missing));
        assert!(pool.supports(&none));
    }

    #[test]
    fn test_base_fields_flatten_to_camel_case() {
        let dock = DockSpec {
            base: BaseModel {
                id: "d1".into(),
                name: "dock-1".into(),
                ..Default::default()
            },
            endpoint: "10.0.0.5:50050".into(),
            driver_name: "sample".into(),
        };

        let json = serde_json::to_value(&dock).unwrap();
        assert_eq!(json["id"], "d1");
        assert_eq!(json["driverName"], "sample");
        assert!(json.get("createdAt").is_none());

        let back: DockSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, dock);
    }

    #[test]
    fn test_merge_skips_empty_fields() {
        let mut base = BaseModel::new("vol", "old");
        let input = BaseModel {
            description: "new".into(),
            ..Default::default()
        };
        base.merge_from(&input);
        assert_eq!(base.name, "vol");
        assert_eq!(base.description, "new");
    }

    #[test]
    fn test_pool_free_capacity() {
        let mut pool = PoolSpec {
            total_capacity: 100,
            used_capacity: 120,
            free_capacity: 7,
            ..Default::default()
        };
        pool.refresh_free_capacity();
        assert_eq!(pool.free_capacity, 0);
    }
}
