//! Domain layer - resource records, wire messages and port definitions
//!
//! This module defines the core traits (ports) that adapters implement,
//! following hexagonal architecture principles.

pub mod messages;
pub mod model;
pub mod ports;

pub use messages::*;
pub use model::*;
pub use ports::*;
