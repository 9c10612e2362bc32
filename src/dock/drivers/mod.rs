//! Storage Drivers
//!
//! The dock selects a driver by the name carried on its dock record. The
//! registry is populated once at start-up and read-only afterwards.

mod sample;

pub use sample::{SampleDriver, SAMPLE_DRIVER_NAME};

use crate::domain::ports::VolumeDriverRef;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Driver name -> driver instance
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, VolumeDriverRef>,
}

impl DriverRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in driver
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SampleDriver::new()));
        registry
    }

    /// Add `driver` under its own name, replacing any previous entry
    pub fn register(&mut self, driver: VolumeDriverRef) {
        let name = driver.driver_name().to_lowercase();
        info!("Registered volume driver {}", name);
        self.drivers.insert(name, driver);
    }

    /// Look up a driver by name (case-insensitive)
    pub fn get(&self, name: &str) -> Result<VolumeDriverRef> {
        self.drivers
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| Error::DriverUnavailable {
                driver: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = DriverRegistry::with_defaults();
        assert_eq!(registry.get("Sample").unwrap().driver_name(), "sample");
        assert_eq!(registry.names(), vec!["sample"]);
    }

    #[test]
    fn test_unknown_driver() {
        let registry = DriverRegistry::new();
        assert_matches!(
            registry.get("ceph").err(),
            Some(Error::DriverUnavailable { driver }) if driver == "ceph"
        );
    }
}
