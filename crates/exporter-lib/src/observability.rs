//! Observability infrastructure for the exporter
//!
//! Provides:
//! - Prometheus self-metrics (collection latency, attempt outcomes, in-flight scrapes)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Histogram, IntCounter,
    IntCounterVec, IntGauge, Registry,
};
use std::time::Duration;
use tracing::{error, info};

/// Histogram buckets for collection cycle duration (in seconds)
const COLLECTION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0,
];

/// Exporter self-metrics
///
/// Registered once at startup into the process registry and then only
/// cloned. Clones share the same underlying metrics.
#[derive(Clone)]
pub struct ExporterMetrics {
    collection_duration_seconds: Histogram,
    scrape_attempts: IntCounterVec,
    targets_abandoned: IntCounter,
    targets_skipped: IntCounter,
    scrapes_in_flight: IntGauge,
    vmis_on_node: IntGauge,
}

impl ExporterMetrics {
    /// Register all self-metrics into `registry`
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            collection_duration_seconds: register_histogram_with_registry!(
                "vmi_exporter_collection_duration_seconds",
                "Time spent collecting stats from all VMI sockets in one scrape",
                COLLECTION_BUCKETS.to_vec(),
                registry
            )?,

            scrape_attempts: register_int_counter_vec_with_registry!(
                "vmi_exporter_scrape_attempts_total",
                "Per-target scrape attempts by outcome",
                &["outcome"],
                registry
            )?,

            targets_abandoned: register_int_counter_with_registry!(
                "vmi_exporter_targets_abandoned_total",
                "Targets still in flight when the collection deadline elapsed",
                registry
            )?,

            targets_skipped: register_int_counter_with_registry!(
                "vmi_exporter_targets_skipped_total",
                "Targets skipped because an earlier attempt was still in flight",
                registry
            )?,

            scrapes_in_flight: register_int_gauge_with_registry!(
                "vmi_exporter_scrapes_in_flight",
                "Number of target scrapes currently holding a worker slot",
                registry
            )?,

            vmis_on_node: register_int_gauge_with_registry!(
                "vmi_exporter_vmis_on_node",
                "Number of VMIs found on this node in the last scrape",
                registry
            )?,
        })
    }

    /// Record a collection cycle duration
    pub fn observe_collection(&self, elapsed: Duration) {
        self.collection_duration_seconds.observe(elapsed.as_secs_f64());
    }

    /// Count one finished attempt by outcome label
    pub fn inc_attempt(&self, outcome: &str) {
        self.scrape_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn inc_abandoned(&self, count: u64) {
        self.targets_abandoned.inc_by(count);
    }

    pub fn inc_skipped(&self) {
        self.targets_skipped.inc();
    }

    pub fn scrape_started(&self) {
        self.scrapes_in_flight.inc();
    }

    pub fn scrape_finished(&self) {
        self.scrapes_in_flight.dec();
    }

    pub fn set_vmis_on_node(&self, count: i64) {
        self.vmis_on_node.set(count);
    }
}

/// Structured logger for exporter events
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    /// Log exporter startup
    pub fn log_startup(&self, version: &str, max_in_flight: usize, timeout: Duration) {
        info!(
            event = "exporter_started",
            node = %self.node_name,
            exporter_version = %version,
            max_in_flight = max_in_flight,
            collection_timeout_ms = timeout.as_millis() as u64,
            "VMI exporter started"
        );
    }

    /// Log exporter shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "exporter_shutdown",
            node = %self.node_name,
            reason = %reason,
            "VMI exporter shutting down"
        );
    }

    /// Log the result of one scrape of the node
    pub fn log_scrape(&self, vmis: usize, targets: usize, samples: usize, elapsed: Duration) {
        info!(
            event = "node_scraped",
            node = %self.node_name,
            vmis = vmis,
            targets = targets,
            samples = samples,
            elapsed_ms = elapsed.as_millis() as u64,
            "Scraped VMIs on node"
        );
    }

    /// Log a failure to list the VMIs of the node
    pub fn log_list_failure(&self, error: &str) {
        error!(
            event = "vmi_list_failed",
            node = %self.node_name,
            error = %error,
            "Failed to list VMIs on node"
        );
    }
}
