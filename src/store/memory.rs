//! In-process key-value backend
//!
//! An ordered map behind a lock. Used by the standalone mode and by tests;
//! it offers no durability and is invisible to other processes.

use crate::domain::ports::KvBackend;
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Ordered in-memory key-value backend
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read();
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, value)| value.clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prefix_scan_stops_at_boundary() {
        let backend = MemoryBackend::new();
        backend.put("/a/volume/v1/attachments/x", "x").await.unwrap();
        backend.put("/a/volume/snapshots/s1", "s1").await.unwrap();
        backend.put("/a/volumes/v1", "v1").await.unwrap();

        assert_eq!(backend.list("/a/volume/snapshots/").await.unwrap(), vec!["s1"]);
        assert_eq!(backend.list("/a/volumes/").await.unwrap(), vec!["v1"]);
        assert_eq!(backend.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let backend = MemoryBackend::new();
        backend.delete("/nothing").await.unwrap();
        assert!(backend.is_empty());
    }
}
