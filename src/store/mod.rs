//! Shared State Store Client
//!
//! A thin client over a consistent key-value store. Every call is bounded
//! by a timeout and calls on one client are serialized by a mutex, so the
//! store operations issued by one process are strictly ordered even though
//! request handling is concurrent. Cross-node consistency comes from the
//! backend itself.

mod etcd;
mod memory;

pub use etcd::{EtcdBackend, EtcdConfig};
pub use memory::MemoryBackend;

use crate::domain::ports::KvBackendRef;
use crate::error::{Error, Result};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Default per-call timeout
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

// =============================================================================
// State Store
// =============================================================================

/// Serialized, timeout-bounded access to the shared key-value store
pub struct StateStore {
    backend: KvBackendRef,
    lock: Mutex<()>,
    timeout: Duration,
    closed: AtomicBool,
}

impl StateStore {
    /// Create a client over `backend`
    pub fn new(backend: KvBackendRef, timeout: Duration) -> Arc<Self> {
        info!(
            "State store client using {} backend ({:?} timeout)",
            backend.backend_name(),
            timeout
        );
        Arc::new(Self {
            backend,
            lock: Mutex::new(()),
            timeout,
            closed: AtomicBool::new(false),
        })
    }

    /// Create a client over a fresh in-process backend
    pub fn in_memory() -> Arc<Self> {
        Self::new(Arc::new(MemoryBackend::new()), DEFAULT_STORE_TIMEOUT)
    }

    /// Store `content` at `path`
    pub async fn create(&self, path: &str, content: &str) -> Result<()> {
        self.call("create", path, self.backend.put(path, content)).await
    }

    /// Fetch the value at `path`; a missing key is a not-found error
    pub async fn get(&self, path: &str) -> Result<String> {
        self.call("get", path, self.backend.get(path))
            .await?
            .ok_or_else(|| Error::not_found("key", path))
    }

    /// Fetch every value under `prefix`; no match yields an empty list
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.call("list", prefix, self.backend.list(prefix)).await
    }

    /// Replace the value at `path` with `new_content`
    pub async fn update(&self, path: &str, new_content: &str) -> Result<()> {
        self.call("update", path, self.backend.put(path, new_content)).await
    }

    /// Remove `path`
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.call("delete", path, self.backend.delete(path)).await
    }

    /// Close the client; later calls fail with [`Error::StoreClosed`]
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _guard = self.lock.lock().await;
        info!("Closing state store client");
        self.backend.close().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call<T, F>(&self, operation: &'static str, key: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_closed() {
            return Err(Error::StoreClosed);
        }

        let _guard = self.lock.lock().await;
        debug!("store {} {}", operation, key);

        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::StoreTimeout {
                operation,
                key: key.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}
