//! Prometheus metrics registration and export.
//!
//! This module defines the Prometheus metrics reported by the inspector and
//! provides functions for initializing, recording and exporting them.
//! Recording before `init_metrics()` is a no-op.

use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

use crate::inspector::QueueStats;
use crate::queue::{QueueKind, RecoverableQueue};

/// Registry and metric handles, installed once by `init_metrics()`.
#[derive(Debug)]
pub struct InspectorMetrics {
    pub registry: Registry,
    /// Number of tasks in each queue at the last stats snapshot, labeled by queue.
    pub queue_depth: GaugeVec,
    /// Tasks moved to pending by the inspector, labeled by source queue.
    pub tasks_requeued_total: CounterVec,
    /// Tasks deleted one by one by the inspector, labeled by queue.
    pub tasks_deleted_total: CounterVec,
    /// Queue purges issued by the inspector, labeled by queue.
    pub queue_purges_total: CounterVec,
}

static METRICS: OnceLock<InspectorMetrics> = OnceLock::new();

/// Returns the installed metrics, if `init_metrics()` has run.
pub fn metrics() -> Option<&'static InspectorMetrics> {
    METRICS.get()
}

/// Initialize all metrics and register them with a new registry.
///
/// Calling this more than once keeps the first set of metrics.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric creation or registration fails.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let queue_depth = GaugeVec::new(
        Opts::new(
            "queue_inspector_queue_depth",
            "Number of tasks in queue at the last stats snapshot",
        ),
        &["queue"],
    )?;

    let tasks_requeued_total = CounterVec::new(
        Opts::new(
            "queue_inspector_tasks_requeued_total",
            "Total tasks moved to the pending queue",
        ),
        &["queue"],
    )?;

    let tasks_deleted_total = CounterVec::new(
        Opts::new(
            "queue_inspector_tasks_deleted_total",
            "Total tasks deleted individually",
        ),
        &["queue"],
    )?;

    let queue_purges_total = CounterVec::new(
        Opts::new("queue_inspector_queue_purges_total", "Total queue purges"),
        &["queue"],
    )?;

    registry.register(Box::new(queue_depth.clone()))?;
    registry.register(Box::new(tasks_requeued_total.clone()))?;
    registry.register(Box::new(tasks_deleted_total.clone()))?;
    registry.register(Box::new(queue_purges_total.clone()))?;

    // A concurrent initializer may have won the race; its metrics are kept.
    let _ = METRICS.set(InspectorMetrics {
        registry,
        queue_depth,
        tasks_requeued_total,
        tasks_deleted_total,
        queue_purges_total,
    });

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Sets the queue depth gauges from a stats snapshot.
pub fn record_stats(stats: &QueueStats) {
    let Some(m) = metrics() else {
        return;
    };

    for queue in QueueKind::ALL {
        m.queue_depth
            .with_label_values(&[queue.as_str()])
            .set(stats.count(queue) as f64);
    }
}

/// Records tasks moved from `queue` to pending.
pub fn record_requeued(queue: RecoverableQueue, count: u64) {
    if let Some(m) = metrics() {
        m.tasks_requeued_total
            .with_label_values(&[queue.kind().as_str()])
            .inc_by(count as f64);
    }
}

pub fn record_deleted(queue: RecoverableQueue) {
    if let Some(m) = metrics() {
        m.tasks_deleted_total
            .with_label_values(&[queue.kind().as_str()])
            .inc();
    }
}

pub fn record_purged(queue: RecoverableQueue) {
    if let Some(m) = metrics() {
        m.queue_purges_total
            .with_label_values(&[queue.kind().as_str()])
            .inc();
    }
}

/// Export all registered metrics in Prometheus text format.
///
/// If the registry has not been initialized or encoding fails, returns a
/// comment line describing the problem.
pub fn export_metrics() -> String {
    let Some(m) = metrics() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = m.registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
