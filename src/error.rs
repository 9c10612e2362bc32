//! Error types for the storage control plane
//!
//! Every fallible operation in the crate returns [`Result`]. Store and
//! repository failures propagate unchanged; the scheduler and orchestrator
//! wrap them with [`Error::Context`] so the caller can see what was being
//! attempted, while [`Error::kind`] still reports the underlying category.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Reason a driver rejected an operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverFailure {
    /// Detach requested for a volume that has nothing attached
    #[error("the volume is not in-use")]
    NotInUse,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Backend(String),
}

impl DriverFailure {
    /// True when the failure only means "nothing to detach".
    ///
    /// Drivers that cannot produce the typed variant report it as text, so
    /// the message is matched as well.
    pub fn is_not_in_use(&self) -> bool {
        match self {
            DriverFailure::NotInUse => true,
            DriverFailure::InvalidArgument(msg) | DriverFailure::Backend(msg) => {
                msg.to_lowercase().contains("volume is not in-use")
            }
        }
    }
}

/// Unified error type for the control plane
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Lookup / Scheduling Errors
    // =========================================================================
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    #[error("No pool resource supports tags [{tags}]")]
    NoSupportedPool { tags: String },

    #[error("No dock resource owns pool {pool_id}")]
    NoSupportedDock { pool_id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    // =========================================================================
    // State Store Errors
    // =========================================================================
    #[error("Store {operation} failed for {key}: {reason}")]
    Store {
        operation: &'static str,
        key: String,
        reason: String,
    },

    #[error("Store {operation} timed out for {key} after {timeout:?}")]
    StoreTimeout {
        operation: &'static str,
        key: String,
        timeout: Duration,
    },

    #[error("Store client is closed")]
    StoreClosed,

    // =========================================================================
    // Driver Errors
    // =========================================================================
    #[error("Driver {driver} failed to {operation}: {failure}")]
    Driver {
        driver: String,
        operation: &'static str,
        failure: DriverFailure,
    },

    #[error("Driver unavailable: {driver}")]
    DriverUnavailable { driver: String },

    // =========================================================================
    // Discovery Errors
    // =========================================================================
    #[error("The {kind} resource is empty")]
    EmptyResource { kind: &'static str },

    // =========================================================================
    // Remote Call Errors
    // =========================================================================
    #[error("Remote call to {endpoint} failed: {reason}")]
    RemoteCall { endpoint: String, reason: String },

    #[error("Dock {endpoint} reported failure: {message}")]
    Remote {
        endpoint: String,
        kind: ErrorKind,
        message: String,
    },

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Category of an error, stable across the dock wire boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    NoSupportedPool,
    NoSupportedDock,
    Validation,
    Store,
    Driver,
    Unavailable,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::NoSupportedPool => "no_supported_pool",
            ErrorKind::NoSupportedDock => "no_supported_dock",
            ErrorKind::Validation => "validation",
            ErrorKind::Store => "store",
            ErrorKind::Driver => "driver",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

/// Action to take on error when committing metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Retry with exponential backoff
    RetryWithBackoff,
    /// Retry after a fixed delay
    RetryAfter(Duration),
    /// Give up and surface the error
    Fail,
}

impl Error {
    /// Shorthand for a typed not-found error
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Shorthand for a driver failure
    pub fn driver(
        driver: impl Into<String>,
        operation: &'static str,
        failure: DriverFailure,
    ) -> Self {
        Error::Driver {
            driver: driver.into(),
            operation,
            failure,
        }
    }

    /// Wrap this error with a description of the attempted operation
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error beneath any context wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::NoSupportedPool { .. } => ErrorKind::NoSupportedPool,
            Error::NoSupportedDock { .. } => ErrorKind::NoSupportedDock,
            Error::Validation(_) | Error::JsonParse(_) | Error::YamlParse(_) => {
                ErrorKind::Validation
            }
            Error::Store { .. } | Error::StoreTimeout { .. } | Error::StoreClosed => {
                ErrorKind::Store
            }
            Error::Driver { .. } => ErrorKind::Driver,
            Error::DriverUnavailable { .. } | Error::RemoteCall { .. } => ErrorKind::Unavailable,
            Error::Remote { kind, .. } => *kind,
            Error::EmptyResource { .. } | Error::Configuration(_) => ErrorKind::Validation,
            Error::Internal(_) | Error::Io(_) | Error::Context { .. } => ErrorKind::Internal,
        }
    }

    /// True for a lookup miss at any layer
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// True when a driver reported the benign "volume is not in-use" failure
    pub fn is_not_in_use(&self) -> bool {
        match self.root() {
            Error::Driver { failure, .. } => failure.is_not_in_use(),
            Error::Remote {
                kind: ErrorKind::Driver,
                message,
                ..
            } => message.to_lowercase().contains("volume is not in-use"),
            _ => false,
        }
    }

    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self.root() {
            // Transient errors - retry with backoff
            Error::Store { .. } | Error::RemoteCall { .. } => ErrorAction::RetryWithBackoff,

            // The store may simply be slow - give it a moment
            Error::StoreTimeout { .. } => ErrorAction::RetryAfter(Duration::from_secs(1)),

            // Everything else is deterministic
            _ => ErrorAction::Fail,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::Fail)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(
            self.root(),
            Error::Store { .. } | Error::StoreTimeout { .. } | Error::RemoteCall { .. }
        )
    }
}

/// Attach operation context to an error result
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}

/// Result type alias for the control plane
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_error_actions() {
        let err = Error::Store {
            operation: "put",
            key: "/k".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(err.action(), ErrorAction::RetryWithBackoff);

        let err = Error::StoreTimeout {
            operation: "get",
            key: "/k".into(),
            timeout: Duration::from_secs(3),
        };
        assert_eq!(err.action(), ErrorAction::RetryAfter(Duration::from_secs(1)));

        let err = Error::Validation("bad payload".into());
        assert_eq!(err.action(), ErrorAction::Fail);
    }

    #[test]
    fn test_error_retryable() {
        let transient = Error::RemoteCall {
            endpoint: "127.0.0.1:50050".into(),
            reason: "connection reset".into(),
        };
        assert!(transient.is_retryable());
        assert!(transient.is_transient());

        let missing = Error::not_found("volume", "v1");
        assert!(!missing.is_retryable());
        assert!(!missing.is_transient());
    }

    #[test]
    fn test_context_preserves_kind() {
        let err = Error::not_found("pool", "p1")
            .context("resolving dock for volume v1")
            .context("deleting volume v1");

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.is_not_found());
        assert_matches!(err.root(), Error::NotFound { kind, id } if kind == "pool" && id == "p1");
        assert!(err.to_string().starts_with("deleting volume v1: resolving dock"));
    }

    #[test]
    fn test_not_in_use_detection() {
        let typed = Error::driver("sample", "delete attachment", DriverFailure::NotInUse);
        assert!(typed.is_not_in_use());

        let textual = Error::driver(
            "lvm",
            "delete attachment",
            DriverFailure::Backend("The status of volume is not in-use".into()),
        );
        assert!(textual.context("detaching").is_not_in_use());

        let other = Error::driver(
            "lvm",
            "delete attachment",
            DriverFailure::Backend("iscsi target busy".into()),
        );
        assert!(!other.is_not_in_use());

        let remote = Error::Remote {
            endpoint: "d1".into(),
            kind: ErrorKind::Driver,
            message: "Driver sample failed to delete attachment: the volume is not in-use".into(),
        };
        assert!(remote.is_not_in_use());
    }
}
