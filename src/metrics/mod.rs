//! Prometheus metrics for the database access layer
//!
//! Collected into a process-wide registry; host processes expose
//! [`Metrics::gather`] through whatever HTTP surface they already run.

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
};
use std::sync::OnceLock;

use crate::endpoint::Role;

/// Global metrics registry
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Get the global metrics instance
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

/// Operation kind label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Read,
    Write,
    Transaction,
}

impl OpKind {
    fn as_str(&self) -> &'static str {
        match self {
            OpKind::Read => "read",
            OpKind::Write => "write",
            OpKind::Transaction => "transaction",
        }
    }
}

fn result_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// Database access metrics collection
pub struct Metrics {
    /// Registry for all metrics
    pub registry: Registry,

    // Routing metrics
    /// Reads routed by initially selected endpoint
    pub reads_routed_total: IntCounterVec,
    /// Replica reads retried against the primary
    pub read_fallbacks_total: IntCounter,

    // Operation metrics
    /// Endpoint operations by kind, role and result
    pub operations_total: IntCounterVec,
    /// Operation latency histogram (in seconds)
    pub operation_duration_seconds: HistogramVec,

    // Transaction metrics
    /// Transaction attempts that were retried
    pub transaction_retries_total: IntCounter,
    /// Transaction outcomes after the retry budget
    pub transactions_total: IntCounterVec,

    // Health check metrics
    /// Probe results by role
    pub health_check_total: IntCounterVec,
    /// Cached health per role (1 healthy, 0 unhealthy)
    pub endpoint_healthy: IntGaugeVec,
}

impl Metrics {
    /// Create a new metrics collection
    pub fn new() -> Self {
        let registry = Registry::new();

        // Routing metrics
        let reads_routed_total = IntCounterVec::new(
            Opts::new(
                "dbroute_reads_routed_total",
                "Total number of reads routed by target endpoint",
            ),
            &["role"],
        )
        .unwrap();

        let read_fallbacks_total = IntCounter::new(
            "dbroute_read_fallbacks_total",
            "Total number of replica reads retried against the primary",
        )
        .unwrap();

        // Operation metrics
        let operations_total = IntCounterVec::new(
            Opts::new(
                "dbroute_operations_total",
                "Total number of endpoint operations",
            ),
            &["kind", "role", "result"],
        )
        .unwrap();

        let operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "dbroute_operation_duration_seconds",
                "Endpoint operation latency in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["kind", "role"],
        )
        .unwrap();

        // Transaction metrics
        let transaction_retries_total = IntCounter::new(
            "dbroute_transaction_retries_total",
            "Total number of transaction attempts that were retried",
        )
        .unwrap();

        let transactions_total = IntCounterVec::new(
            Opts::new(
                "dbroute_transactions_total",
                "Total number of transactions by final result",
            ),
            &["result"],
        )
        .unwrap();

        // Health check metrics
        let health_check_total = IntCounterVec::new(
            Opts::new(
                "dbroute_health_check_total",
                "Total number of health probes by role and result",
            ),
            &["role", "result"],
        )
        .unwrap();

        let endpoint_healthy = IntGaugeVec::new(
            Opts::new(
                "dbroute_endpoint_healthy",
                "Cached endpoint health (1 healthy, 0 unhealthy)",
            ),
            &["role"],
        )
        .unwrap();

        // Register all metrics
        registry
            .register(Box::new(reads_routed_total.clone()))
            .unwrap();
        registry
            .register(Box::new(read_fallbacks_total.clone()))
            .unwrap();
        registry
            .register(Box::new(operations_total.clone()))
            .unwrap();
        registry
            .register(Box::new(operation_duration_seconds.clone()))
            .unwrap();
        registry
            .register(Box::new(transaction_retries_total.clone()))
            .unwrap();
        registry
            .register(Box::new(transactions_total.clone()))
            .unwrap();
        registry
            .register(Box::new(health_check_total.clone()))
            .unwrap();
        registry
            .register(Box::new(endpoint_healthy.clone()))
            .unwrap();

        Self {
            registry,
            reads_routed_total,
            read_fallbacks_total,
            operations_total,
            operation_duration_seconds,
            transaction_retries_total,
            transactions_total,
            health_check_total,
            endpoint_healthy,
        }
    }

    /// Record route decision for a read
    pub fn record_read_route(&self, role: Role) {
        self.reads_routed_total
            .with_label_values(&[role.as_str()])
            .inc();
    }

    /// Record a replica-to-primary fallback hop
    pub fn record_read_fallback(&self) {
        self.read_fallbacks_total.inc();
    }

    /// Record one endpoint operation
    pub fn record_operation(&self, kind: OpKind, role: Role, success: bool, duration_secs: f64) {
        self.operations_total
            .with_label_values(&[kind.as_str(), role.as_str(), result_label(success)])
            .inc();
        self.operation_duration_seconds
            .with_label_values(&[kind.as_str(), role.as_str()])
            .observe(duration_secs);
    }

    /// Record a transaction retry
    pub fn record_transaction_retry(&self) {
        self.transaction_retries_total.inc();
    }

    /// Record the final result of a transaction
    pub fn record_transaction(&self, success: bool) {
        self.transactions_total
            .with_label_values(&[result_label(success)])
            .inc();
    }

    /// Record a health probe result
    pub fn record_health_check(&self, role: Role, success: bool) {
        self.health_check_total
            .with_label_values(&[role.as_str(), result_label(success)])
            .inc();
    }

    /// Update cached health gauge
    pub fn set_endpoint_healthy(&self, role: Role, healthy: bool) {
        self.endpoint_healthy
            .with_label_values(&[role.as_str()])
            .set(i64::from(healthy));
    }

    /// Get metrics as Prometheus text format
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
