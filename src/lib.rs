//! SDS Orchestrator - policy-driven block storage control plane
//!
//! A controller schedules volume, attachment and snapshot requests onto
//! docks by matching profile tags against pool capabilities. Each dock runs
//! a storage driver and records every outcome in a shared key-value store,
//! so all nodes see the same resources.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Controller                            │
//! │   ┌──────────────┐     ┌──────────────┐                      │
//! │   │  REST API    │ ──▶ │  Scheduler   │                      │
//! │   └──────────────┘     └──────┬───────┘                      │
//! │                               │ DockRequest                  │
//! ├───────────────────────────────┼──────────────────────────────┤
//! │                          Dock │                              │
//! │   ┌──────────────┐     ┌──────▼───────┐     ┌─────────────┐  │
//! │   │  Discovery   │     │ Orchestrator │ ──▶ │   Driver    │  │
//! │   └──────┬───────┘     └──────┬───────┘     └─────────────┘  │
//! ├──────────┼────────────────────┼──────────────────────────────┤
//! │          ▼                    ▼                              │
//! │        Resource Repository  ──▶  State Store (memory/etcd)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`store`]: serialized, timeout-bounded key-value client
//! - [`repository`]: typed CRUD over the store
//! - [`scheduler`]: profile, pool and dock resolution
//! - [`dock`]: orchestrator, drivers, discovery and the dock server
//! - [`controlplane`]: controller, dock clients and REST API
//! - [`config`]: file and command-line configuration
//! - [`metrics`]: Prometheus metrics
//! - [`domain`]: records, remote-call messages and ports
//! - [`error`]: error types and handling

pub mod config;
pub mod controlplane;
pub mod dock;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod repository;
pub mod scheduler;
pub mod store;

// Re-export commonly used types
pub use config::{CliOverrides, Config, StoreBackend};

pub use controlplane::{
    ApiServer, ApiServerConfig, Controller, HttpDockClient, LocalDockService, RestRouter,
};

pub use dock::{
    Discovery, DockOrchestrator, DockServer, DriverRegistry, FileInventory, ReconcilePolicy,
    Reconciler,
};

pub use domain::model::{
    BaseModel, DockSpec, ExtraSpec, HostInfo, PoolSpec, ProfileSpec, VolumeAttachmentSpec,
    VolumeSnapshotSpec, VolumeSpec,
};

pub use domain::ports::{DockService, InventorySource, KvBackend, VolumeDriver};

pub use error::{Error, ErrorAction, ErrorKind, Result};

pub use repository::ResourceRepository;
pub use scheduler::{Placement, Scheduler};
pub use store::StateStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
