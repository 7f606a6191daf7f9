use std::time::Instant;

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct GroupLabels {
    group: String,
}

/// Reconciliation metrics for the Lifecycle Controller, registered once per `cmd/reconcile`
/// process and shared with the `/metrics` HTTP handler via [`ControllerMetrics::encode`].
#[derive(Clone)]
pub struct ControllerMetrics {
    reconcile_operations: Counter,
    reconcile_failures: Counter,
    reconcile_duration: Histogram,
    orphans_deleted: Counter,
    spec_replicas: Family<GroupLabels, Gauge>,
    ready: Gauge,
    registry: std::sync::Arc<Registry>,
}

impl ControllerMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let reconcile_operations = Counter::default();
        registry.register(
            "reconcile_operations",
            "Total number of reconcile passes over the declared groups",
            reconcile_operations.clone(),
        );

        let reconcile_failures = Counter::default();
        registry.register(
            "reconcile_failures",
            "Number of groups that failed to reconcile",
            reconcile_failures.clone(),
        );

        let reconcile_duration = Histogram::new(exponential_buckets(0.5, 2.0, 8));
        registry.register(
            "reconcile_duration_seconds",
            "Duration of a full reconcile pass",
            reconcile_duration.clone(),
        );

        let orphans_deleted = Counter::default();
        registry.register(
            "reconcile_orphans_deleted",
            "Number of orphaned objects deleted during a reconcile pass",
            orphans_deleted.clone(),
        );

        let spec_replicas = Family::<GroupLabels, Gauge>::default();
        registry.register(
            "spec_replicas",
            "Replica count declared for a group's deployment",
            spec_replicas.clone(),
        );

        let ready = Gauge::default();
        registry.register(
            "ready",
            "1 when the controller completed its last reconcile pass without error",
            ready.clone(),
        );

        Self {
            reconcile_operations,
            reconcile_failures,
            reconcile_duration,
            orphans_deleted,
            spec_replicas,
            ready,
            registry: std::sync::Arc::new(registry),
        }
    }

    pub fn reconcile_count_and_measure(&self) -> ReconcileMeasurer {
        self.reconcile_operations.inc();
        ReconcileMeasurer {
            start: Instant::now(),
            histogram: self.reconcile_duration.clone(),
        }
    }

    pub fn reconcile_failure_inc(&self) {
        self.reconcile_failures.inc();
    }

    pub fn orphans_deleted_add(&self, n: u64) {
        self.orphans_deleted.inc_by(n);
    }

    pub fn spec_replicas_set(&self, group: &str, replicas: i64) {
        self.spec_replicas
            .get_or_create(&GroupLabels {
                group: group.to_string(),
            })
            .set(replicas);
    }

    pub fn ready_set(&self, status: i64) {
        self.ready.set(status);
    }

    /// Render the registry in Prometheus text exposition format for the `/metrics` endpoint.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Records the elapsed time into the duration histogram on drop.
pub struct ReconcileMeasurer {
    start: Instant,
    histogram: Histogram,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
