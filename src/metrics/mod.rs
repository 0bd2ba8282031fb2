//! Metrics module for Prometheus-based monitoring.
//!
//! Exposes queue depth and inspector activity so a dashboard can scrape the
//! same numbers the `stats` command reports.
//!
//! # Example
//!
//! ```ignore
//! use queue_inspector::metrics::{init_metrics, export_metrics};
//!
//! init_metrics().expect("Failed to initialize metrics");
//!
//! // Every stats snapshot updates the queue depth gauges
//! inspector.current_stats().await?;
//!
//! let metrics_text = export_metrics();
//! ```

pub mod prometheus;

pub use self::prometheus::{
    export_metrics, init_metrics, metrics, record_deleted, record_purged, record_requeued,
    record_stats, InspectorMetrics,
};
