//! Prometheus metrics for dock operations and discovery
//!
//! Metrics live in the default prometheus registry so the `/metrics`
//! endpoint can gather them alongside anything else the process registers.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;

static GLOBAL: OnceLock<Option<OperationMetrics>> = OnceLock::new();

/// Counters and latency histograms keyed by resource, action and outcome
#[derive(Clone)]
pub struct OperationMetrics {
    operations: IntCounterVec,
    duration: HistogramVec,
    discovered: IntGaugeVec,
}

impl OperationMetrics {
    /// Create the metric families and register them with `registry`
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let operations = IntCounterVec::new(
            Opts::new("sds_dock_operations_total", "Dock operations by outcome"),
            &["resource", "action", "outcome"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "sds_dock_operation_duration_seconds",
                "Duration of dock operations, driver call and metadata write",
            ),
            &["resource", "action"],
        )?;
        let discovered = IntGaugeVec::new(
            Opts::new("sds_discovered_resources", "Resources registered by discovery"),
            &["kind"],
        )?;

        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(discovered.clone()))?;

        Ok(Self {
            operations,
            duration,
            discovered,
        })
    }

    pub fn observe(&self, resource: &str, action: &str, success: bool, elapsed: Duration) {
        let outcome = if success { "success" } else { "failure" };
        self.operations
            .with_label_values(&[resource, action, outcome])
            .inc();
        self.duration
            .with_label_values(&[resource, action])
            .observe(elapsed.as_secs_f64());
    }

    pub fn set_discovered(&self, kind: &str, count: usize) {
        self.discovered
            .with_label_values(&[kind])
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    pub fn operation_count(&self, resource: &str, action: &str, outcome: &str) -> u64 {
        self.operations
            .with_label_values(&[resource, action, outcome])
            .get()
    }
}

/// Process-wide metrics in the default registry.
///
/// Returns `None` if registration failed; recording is then skipped.
pub fn global() -> Option<&'static OperationMetrics> {
    GLOBAL
        .get_or_init(|| match OperationMetrics::register(prometheus::default_registry()) {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                warn!("Failed to register operation metrics: {}", e);
                None
            }
        })
        .as_ref()
}

/// Record one finished dock operation
pub fn record_operation(resource: &str, action: &str, success: bool, elapsed: Duration) {
    if let Some(metrics) = global() {
        metrics.observe(resource, action, success, elapsed);
    }
}

pub fn record_discovered(kind: &str, count: usize) {
    if let Some(metrics) = global() {
        metrics.set_discovered(kind, count);
    }
}

/// Text exposition of every metric in the default registry
pub fn gather_text() -> Result<(String, Vec<u8>), prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok((encoder.format_type().to_string(), buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_counts_by_outcome() {
        let registry = Registry::new();
        let metrics = OperationMetrics::register(&registry).unwrap();

        metrics.observe("volume", "create", true, Duration::from_millis(5));
        metrics.observe("volume", "create", true, Duration::from_millis(7));
        metrics.observe("volume", "create", false, Duration::from_millis(1));

        assert_eq!(metrics.operation_count("volume", "create", "success"), 2);
        assert_eq!(metrics.operation_count("volume", "create", "failure"), 1);
        assert_eq!(metrics.operation_count("snapshot", "delete", "success"), 0);
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        OperationMetrics::register(&registry).unwrap();
        assert!(OperationMetrics::register(&registry).is_err());
    }

    #[test]
    fn test_gather_text_includes_recorded_operations() {
        record_operation("attachment", "delete", true, Duration::from_millis(2));
        let (content_type, body) = gather_text().unwrap();
        assert!(content_type.starts_with("text/plain"));
        assert!(String::from_utf8(body)
            .unwrap()
            .contains("sds_dock_operations_total"));
    }
}
