//! Remote-call payloads exchanged between the controller and a dock

use crate::domain::model::{DockSpec, HostInfo};
use crate::error::{Error, ErrorKind, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Resource a dock request operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Volume,
    Attachment,
    Snapshot,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Volume => write!(f, "volume"),
            ResourceKind::Attachment => write!(f, "attachment"),
            ResourceKind::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// Lifecycle action requested on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Get,
    Update,
    Delete,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Get => write!(f, "get"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

/// Request forwarded to the orchestrator on the selected dock.
///
/// `dock_info` and `host_info` travel as serialized JSON documents so the
/// dock parses exactly what the controller resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockRequest {
    pub resource: ResourceKind,
    pub action: Action,
    pub dock_info: String,
    #[serde(default)]
    pub volume_id: String,
    #[serde(default)]
    pub volume_name: String,
    #[serde(default)]
    pub volume_description: String,
    #[serde(default)]
    pub volume_size: u64,
    #[serde(default)]
    pub pool_id: String,
    #[serde(default)]
    pub profile_id: String,
    #[serde(default)]
    pub attachment_id: String,
    #[serde(default)]
    pub host_info: String,
    #[serde(default)]
    pub mountpoint: String,
    #[serde(default)]
    pub do_local_attach: bool,
    #[serde(default)]
    pub multipath: bool,
    #[serde(default)]
    pub snapshot_id: String,
    #[serde(default)]
    pub snapshot_name: String,
    #[serde(default)]
    pub snapshot_description: String,
}

impl DockRequest {
    /// Start a request addressed to `dock`
    pub fn new(resource: ResourceKind, action: Action, dock: &DockSpec) -> Result<Self> {
        Ok(Self {
            resource,
            action,
            dock_info: serde_json::to_string(dock)?,
            volume_id: String::new(),
            volume_name: String::new(),
            volume_description: String::new(),
            volume_size: 0,
            pool_id: String::new(),
            profile_id: String::new(),
            attachment_id: String::new(),
            host_info: String::new(),
            mountpoint: String::new(),
            do_local_attach: false,
            multipath: false,
            snapshot_id: String::new(),
            snapshot_name: String::new(),
            snapshot_description: String::new(),
        })
    }

    pub fn with_volume_id(mut self, volume_id: impl Into<String>) -> Self {
        self.volume_id = volume_id.into();
        self
    }

    pub fn with_host_info(mut self, host: &HostInfo) -> Result<Self> {
        self.host_info = serde_json::to_string(host)?;
        Ok(self)
    }

    /// Decode the dock descriptor carried by this request
    pub fn dock(&self) -> Result<DockSpec> {
        decode_descriptor("dock", &self.dock_info)
    }

    /// Decode the host descriptor carried by this request
    pub fn host(&self) -> Result<HostInfo> {
        decode_descriptor("host", &self.host_info)
    }
}

/// Decode a descriptor that must be a JSON object.
///
/// A sequence such as `[]` is rejected even when every field has a default.
fn decode_descriptor<T: DeserializeOwned>(what: &str, raw: &str) -> Result<T> {
    let malformed =
        |reason: String| Error::Validation(format!("malformed {} info: {}", what, reason));

    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(malformed("expected a JSON object".into()));
    }
    serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
}

/// Outcome status reported by a dock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    Success,
    Failure,
}

/// Response returned by a dock for every request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockResponse {
    pub status: ResponseStatus,
    /// Serialized resource on success, or a short confirmation
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl DockResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
            error: None,
            error_kind: None,
        }
    }

    /// Serialize `resource` into a success response
    pub fn with_resource<T: Serialize>(resource: &T) -> Result<Self> {
        Ok(Self::success(serde_json::to_string(resource)?))
    }

    pub fn failure(error: &Error) -> Self {
        Self {
            status: ResponseStatus::Failure,
            message: String::new(),
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// Convert a failure into an error attributed to `endpoint`
    pub fn into_result(self, endpoint: &str) -> Result<String> {
        match self.status {
            ResponseStatus::Success => Ok(self.message),
            ResponseStatus::Failure => Err(Error::Remote {
                endpoint: endpoint.to_string(),
                kind: self.error_kind.unwrap_or(ErrorKind::Internal),
                message: self.error.unwrap_or_default(),
            }),
        }
    }

    /// Decode the resource carried by a success response
    pub fn decode<T: DeserializeOwned>(self, endpoint: &str) -> Result<T> {
        let message = self.into_result(endpoint)?;
        serde_json::from_str(&message).map_err(|e| Error::RemoteCall {
            endpoint: endpoint.to_string(),
            reason: format!("undecodable response body: {}", e),
        })
    }
}
