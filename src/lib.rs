//! queue-inspector: inspection and recovery for a Redis-backed task queue.
//!
//! Reads the five lifecycle queues that producers and workers share, reports
//! their depth and contents, and moves scheduled, retry or dead tasks back to
//! pending (or deletes them) with atomic server-side scripts.

pub mod cli;
pub mod config;
pub mod error;
pub mod inspector;
pub mod metrics;
pub mod queue;

pub use config::{ConfigError, InspectorConfig};
pub use error::{InspectorError, Result};
pub use inspector::{Inspector, QueueStats};
pub use queue::{QueueKind, RecoverableQueue, TaskId, TaskRecord};
