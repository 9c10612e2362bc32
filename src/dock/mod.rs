//! Dock
//!
//! Everything that runs on a dock node: the driver registry, the
//! orchestrator that executes requests against a driver, metadata
//! reconciliation, start-up discovery and the remote-call server.

pub mod discovery;
pub mod drivers;
pub mod orchestrator;
pub mod reconcile;
pub mod server;

pub use discovery::{Discovery, DiscoveryReport, FileInventory, Inventory, DEFAULT_INVENTORY_PATH};
pub use drivers::{DriverRegistry, SampleDriver, SAMPLE_DRIVER_NAME};
pub use orchestrator::DockOrchestrator;
pub use reconcile::{ReconcilePolicy, Reconciler};
pub use server::{dock_router, DockServer, DEFAULT_DOCK_ADDR, DOCK_RPC_PATH};
