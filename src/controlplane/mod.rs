//! Control Plane Module
//!
//! The controller side: the REST front door, the controller that
//! schedules requests onto docks, and the clients that reach them.

pub mod api;
pub mod client;
pub mod controller;

pub use api::{ApiServer, ApiServerConfig, RestRouter};
pub use client::{HttpDockClient, LocalDockService, DEFAULT_CALL_TIMEOUT};
pub use controller::{Controller, CreateAttachmentInput, CreateSnapshotInput, CreateVolumeInput};
