//! Command-line interface for qinspect.
//!
//! Provides commands for queue stats, task listings, and requeue, delete and
//! purge operations.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli};
