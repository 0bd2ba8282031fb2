//! CLI command definitions for qinspect.
//!
//! Each subcommand maps onto one inspector operation. Tables go to stdout,
//! logs go to stderr.

use std::collections::BTreeMap;

use clap::Parser;
use serde::Serialize;

use crate::config::InspectorConfig;
use crate::inspector::{
    ActiveTask, DeadTask, Inspector, PendingTask, QueueStats, RetryTask, ScheduledTask,
};
use crate::metrics;
use crate::queue::{Payload, QueueKind, RecoverableQueue, TaskId};

/// Inspect and recover tasks in a Redis-backed task queue.
#[derive(Parser)]
#[command(name = "qinspect")]
#[command(about = "Inspect and recover tasks in a Redis-backed task queue")]
#[command(version)]
#[command(
    long_about = "qinspect reports queue depth, lists pending/active/scheduled/retry/dead tasks, \
and moves scheduled, retry or dead tasks back to pending (or deletes them).\n\n\
Example usage:\n  qinspect ls dead\n  qinspect requeue dead b50rsv3ktj6vp1f7jnmg 1700000000"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Redis URL (overrides INSPECTOR_REDIS_URL / REDIS_URL).
    #[arg(long, global = true)]
    pub redis_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Show the number of tasks in every queue.
    Stats(OutputArgs),

    /// Show the Redis INFO report.
    Info(OutputArgs),

    /// List the tasks in a queue.
    Ls(LsArgs),

    /// Move scheduled, retry or dead tasks back to pending.
    Requeue(RequeueArgs),

    /// Permanently delete a scheduled, retry or dead task.
    Delete(DeleteArgs),

    /// Delete every task in a scheduled, retry or dead queue.
    Purge(PurgeArgs),

    /// Take a stats snapshot and print it in Prometheus text format.
    Metrics,
}

/// Output options shared by read-only commands.
#[derive(Parser, Debug)]
pub struct OutputArgs {
    /// Print JSON instead of a table.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `qinspect ls`.
#[derive(Parser, Debug)]
pub struct LsArgs {
    /// Queue to list: pending, active, scheduled, retry or dead.
    pub queue: QueueKind,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for `qinspect requeue`.
#[derive(Parser, Debug)]
pub struct RequeueArgs {
    /// Source queue: scheduled, retry or dead.
    pub queue: RecoverableQueue,

    /// ID of the task to requeue.
    #[arg(required_unless_present = "all")]
    pub id: Option<TaskId>,

    /// Score of the task, as shown by `qinspect ls`.
    #[arg(required_unless_present = "all", allow_negative_numbers = true)]
    pub score: Option<f64>,

    /// Requeue every task in the queue.
    #[arg(long, conflicts_with_all = ["id", "score"])]
    pub all: bool,
}

/// Arguments for `qinspect delete`.
#[derive(Parser, Debug)]
pub struct DeleteArgs {
    /// Queue holding the task: scheduled, retry or dead.
    pub queue: RecoverableQueue,

    /// ID of the task to delete.
    pub id: TaskId,

    /// Score of the task, as shown by `qinspect ls`.
    #[arg(allow_negative_numbers = true)]
    pub score: f64,
}

/// Arguments for `qinspect purge`.
#[derive(Parser, Debug)]
pub struct PurgeArgs {
    /// Queue to purge: scheduled, retry or dead.
    pub queue: RecoverableQueue,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let mut config = InspectorConfig::from_env()?;
    if let Some(url) = cli.redis_url {
        config = config.with_redis_url(url);
    }
    config.validate()?;

    if config.metrics_enabled || matches!(cli.command, Commands::Metrics) {
        metrics::init_metrics()?;
    }

    let inspector = Inspector::connect(&config.redis_url).await?;

    match cli.command {
        Commands::Stats(args) => {
            let stats = inspector.current_stats().await?;
            if args.json {
                print_json(&stats)?;
            } else {
                print_stats(&stats);
            }
        }
        Commands::Info(args) => {
            let info: BTreeMap<String, String> =
                inspector.backing_store_info().await?.into_iter().collect();
            if args.json {
                print_json(&info)?;
            } else {
                for (key, value) in &info {
                    println!("{key}: {value}");
                }
            }
        }
        Commands::Ls(args) => run_ls_command(&inspector, args).await?,
        Commands::Requeue(args) => run_requeue_command(&inspector, args).await?,
        Commands::Delete(args) => {
            inspector.delete(args.queue, &args.id, args.score).await?;
            println!("✓ Deleted {} task {}", args.queue, args.id);
        }
        Commands::Purge(args) => {
            inspector.purge(args.queue).await?;
            println!("✓ Purged {} queue", args.queue);
        }
        Commands::Metrics => {
            inspector.current_stats().await?;
            print!("{}", metrics::export_metrics());
        }
    }

    Ok(())
}

async fn run_ls_command(inspector: &Inspector, args: LsArgs) -> anyhow::Result<()> {
    let json = args.output.json;

    match args.queue {
        QueueKind::Pending => {
            let tasks = inspector.list_pending().await?;
            if json {
                print_json(&tasks)?;
            } else {
                print_table(&["ID", "TYPE", "PAYLOAD"], tasks.iter().map(pending_row));
            }
        }
        QueueKind::Active => {
            let tasks = inspector.list_active().await?;
            if json {
                print_json(&tasks)?;
            } else {
                print_table(&["ID", "TYPE", "PAYLOAD"], tasks.iter().map(active_row));
            }
        }
        QueueKind::Scheduled => {
            let tasks = inspector.list_scheduled().await?;
            if json {
                print_json(&tasks)?;
            } else {
                print_table(
                    &["ID", "TYPE", "PROCESS AT", "SCORE"],
                    tasks.iter().map(scheduled_row),
                );
            }
        }
        QueueKind::Retry => {
            let tasks = inspector.list_retry().await?;
            if json {
                print_json(&tasks)?;
            } else {
                print_table(
                    &["ID", "TYPE", "NEXT ATTEMPT", "RETRIED", "ERROR", "SCORE"],
                    tasks.iter().map(retry_row),
                );
            }
        }
        QueueKind::Dead => {
            let tasks = inspector.list_dead().await?;
            if json {
                print_json(&tasks)?;
            } else {
                print_table(
                    &["ID", "TYPE", "LAST FAILED", "ERROR", "SCORE"],
                    tasks.iter().map(dead_row),
                );
            }
        }
    }

    Ok(())
}

async fn run_requeue_command(inspector: &Inspector, args: RequeueArgs) -> anyhow::Result<()> {
    if args.all {
        let moved = inspector.requeue_all(args.queue).await?;
        println!("✓ Requeued {} {} task(s) to pending", moved, args.queue);
        return Ok(());
    }

    let (Some(id), Some(score)) = (args.id, args.score) else {
        anyhow::bail!("requeue needs a task ID and score, or --all");
    };

    inspector.requeue(args.queue, &id, score).await?;
    println!("✓ Requeued {} task {} to pending", args.queue, id);
    Ok(())
}

fn print_stats(stats: &QueueStats) {
    println!("{:<10} {:>10}", "QUEUE", "SIZE");
    for queue in QueueKind::ALL {
        println!("{:<10} {:>10}", queue, stats.count(queue));
    }
    println!("{:<10} {:>10}", "total", stats.total());
    println!();
    println!("Captured at {}", stats.captured_at.to_rfc3339());
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints rows under a header, padding each column to its widest cell.
fn print_table(header: &[&str], rows: impl Iterator<Item = Vec<String>>) {
    let rows: Vec<Vec<String>> = rows.collect();
    if rows.is_empty() {
        println!("No tasks");
        return;
    }

    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render = |cells: Vec<String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", render(header.iter().map(|h| h.to_string()).collect()));
    for row in rows {
        println!("{}", render(row));
    }
}

fn payload_cell(payload: &Payload) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| "<unprintable>".to_string())
}

fn pending_row(task: &PendingTask) -> Vec<String> {
    vec![
        task.id.to_string(),
        task.task_type.clone(),
        payload_cell(&task.payload),
    ]
}

fn active_row(task: &ActiveTask) -> Vec<String> {
    vec![
        task.id.to_string(),
        task.task_type.clone(),
        payload_cell(&task.payload),
    ]
}

fn scheduled_row(task: &ScheduledTask) -> Vec<String> {
    vec![
        task.id.to_string(),
        task.task_type.clone(),
        task.process_at.to_rfc3339(),
        task.score.to_string(),
    ]
}

fn retry_row(task: &RetryTask) -> Vec<String> {
    vec![
        task.id.to_string(),
        task.task_type.clone(),
        task.process_at.to_rfc3339(),
        format!("{}/{}", task.retry_count, task.retry_limit),
        task.error_msg.clone(),
        task.score.to_string(),
    ]
}

fn dead_row(task: &DeadTask) -> Vec<String> {
    vec![
        task.id.to_string(),
        task.task_type.clone(),
        task.last_failed_at.to_rfc3339(),
        task.error_msg.clone(),
        task.score.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        // Verify CLI definition is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_stats_command_defaults() {
        let cli = Cli::try_parse_from(["qinspect", "stats"]).expect("should parse");

        assert_eq!(cli.log_level, "info");
        assert!(cli.redis_url.is_none());
        match cli.command {
            Commands::Stats(args) => assert!(!args.json),
            _ => panic!("Expected Stats command"),
        }
    }

    #[test]
    fn test_ls_command_parses_queue() {
        let cli = Cli::try_parse_from(["qinspect", "ls", "retry", "--json"]).expect("should parse");

        match cli.command {
            Commands::Ls(args) => {
                assert_eq!(args.queue, QueueKind::Retry);
                assert!(args.output.json);
            }
            _ => panic!("Expected Ls command"),
        }

        assert!(Cli::try_parse_from(["qinspect", "ls", "archived"]).is_err());
    }

    #[test]
    fn test_requeue_single_task() {
        let cli = Cli::try_parse_from([
            "qinspect",
            "--redis-url",
            "redis://localhost:6380",
            "requeue",
            "dead",
            "b50rsv3ktj6vp1f7jnmg",
            "1700000000.5",
        ])
        .expect("should parse");

        assert_eq!(cli.redis_url.as_deref(), Some("redis://localhost:6380"));
        match cli.command {
            Commands::Requeue(args) => {
                assert_eq!(args.queue, RecoverableQueue::Dead);
                assert_eq!(args.id, Some(TaskId::new("b50rsv3ktj6vp1f7jnmg")));
                assert_eq!(args.score, Some(1_700_000_000.5));
                assert!(!args.all);
            }
            _ => panic!("Expected Requeue command"),
        }
    }

    #[test]
    fn test_requeue_all() {
        let cli = Cli::try_parse_from(["qinspect", "requeue", "scheduled", "--all"])
            .expect("should parse");

        match cli.command {
            Commands::Requeue(args) => {
                assert_eq!(args.queue, RecoverableQueue::Scheduled);
                assert!(args.all);
                assert!(args.id.is_none());
            }
            _ => panic!("Expected Requeue command"),
        }
    }

    #[test]
    fn test_requeue_requires_id_or_all() {
        assert!(Cli::try_parse_from(["qinspect", "requeue", "retry"]).is_err());
        let both = ["qinspect", "requeue", "retry", "abc", "1", "--all"];
        assert!(Cli::try_parse_from(both).is_err());
    }

    #[test]
    fn test_transitions_reject_list_queues() {
        assert!(Cli::try_parse_from(["qinspect", "requeue", "active", "--all"]).is_err());
        assert!(Cli::try_parse_from(["qinspect", "delete", "pending", "abc", "1"]).is_err());
        assert!(Cli::try_parse_from(["qinspect", "purge", "active"]).is_err());
        assert!(Cli::try_parse_from(["qinspect", "purge", "dead"]).is_ok());
    }

    #[test]
    fn test_rows_show_score_for_transitions() {
        let task = DeadTask {
            id: TaskId::new("abc"),
            task_type: "email".to_string(),
            payload: Payload::new(),
            last_failed_at: DateTime::from_timestamp(1_700_000_000, 0).expect("valid time"),
            score: 1_700_000_000.25,
            error_msg: "boom".to_string(),
        };

        let row = dead_row(&task);
        assert_eq!(row[0], "abc");
        assert_eq!(row[3], "boom");
        assert_eq!(row[4].parse::<f64>().expect("score parses"), task.score);
    }
}
