//! Metadata reconciliation
//!
//! Once a driver call has succeeded the backend state exists, so the
//! matching metadata write must not be dropped on a transient store error.
//! [`Reconciler::commit`] retries the write with exponential backoff while
//! the failure is transient. If the write still fails, the divergence
//! between backend and shared state is logged with the resource id and the
//! error is returned.

use crate::error::{Error, ErrorAction, Result};
use backoff::ExponentialBackoffBuilder;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Retry policy for metadata writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilePolicy {
    /// Retry at all; when false the first failure is final
    pub enabled: bool,
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    /// Give up once this much time has passed
    pub max_elapsed_ms: u64,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_interval_ms: 100,
            max_interval_ms: 2_000,
            max_elapsed_ms: 10_000,
        }
    }
}

impl ReconcilePolicy {
    /// Single attempt, no retries
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Commits metadata writes that follow a successful driver call
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    policy: ReconcilePolicy,
}

impl Reconciler {
    pub fn new(policy: ReconcilePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }

    /// Run `write` until it succeeds, fails permanently, or the policy's
    /// time budget runs out.
    ///
    /// `what` and `id` identify the resource in logs.
    pub async fn commit<T, F, Fut>(&self, what: &str, id: &str, write: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let result = if self.policy.enabled {
            let write = &write;
            backoff::future::retry_notify(
                self.backoff(),
                move || async move {
                    write().await.map_err(|e| match e.action() {
                        ErrorAction::RetryWithBackoff => backoff::Error::transient(e),
                        ErrorAction::RetryAfter(wait) => backoff::Error::retry_after(e, wait),
                        ErrorAction::Fail => backoff::Error::permanent(e),
                    })
                },
                |e: Error, wait: Duration| {
                    warn!("Retrying {} {} metadata write in {:?}: {}", what, id, wait, e);
                },
            )
            .await
        } else {
            write().await
        };

        result.map_err(|e| {
            error!(
                "Backend and shared state diverged for {} {}: metadata write failed: {}",
                what, id, e
            );
            e
        })
    }

    fn backoff(&self) -> backoff::ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.policy.initial_interval_ms))
            .with_max_interval(Duration::from_millis(self.policy.max_interval_ms))
            .with_max_elapsed_time(Some(Duration::from_millis(self.policy.max_elapsed_ms)))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast() -> Reconciler {
        Reconciler::new(ReconcilePolicy {
            enabled: true,
            initial_interval_ms: 1,
            max_interval_ms: 5,
            max_elapsed_ms: 200,
        })
    }

    fn store_error() -> Error {
        Error::Store {
            operation: "create",
            key: "/k".into(),
            reason: "leader changed".into(),
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let attempts = AtomicUsize::new(0);

        let result = fast()
            .commit("volume", "v1", || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(store_error())
                } else {
                    Ok("stored")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "stored");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let attempts = AtomicUsize::new(0);

        let result: Result<()> = fast()
            .commit("volume", "v1", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::Validation("bad record".into()))
            })
            .await;

        assert_matches!(result, Err(Error::Validation(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let attempts = AtomicUsize::new(0);

        let result: Result<()> = fast()
            .commit("snapshot", "s1", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(store_error())
            })
            .await;

        assert_matches!(result, Err(Error::Store { .. }));
        assert!(attempts.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_disabled_policy_makes_one_attempt() {
        let attempts = AtomicUsize::new(0);
        let reconciler = Reconciler::new(ReconcilePolicy::disabled());

        let result: Result<()> = reconciler
            .commit("volume", "v1", || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(store_error())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
