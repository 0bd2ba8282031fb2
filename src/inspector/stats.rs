//! Queue counts and Redis diagnostics.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::Inspector;
use crate::error::Result;
use crate::metrics;
use crate::queue::QueueKind;

/// Point-in-time task counts across the five queues.
///
/// The counts are fetched in one pipelined round trip but are not a
/// transactional snapshot; each count is only consistent with itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: u64,
    pub active: u64,
    pub scheduled: u64,
    pub retry: u64,
    pub dead: u64,
    /// When the counts were received.
    pub captured_at: DateTime<Utc>,
}

impl QueueStats {
    /// Returns the count for a single queue.
    pub fn count(&self, queue: QueueKind) -> u64 {
        match queue {
            QueueKind::Pending => self.pending,
            QueueKind::Active => self.active,
            QueueKind::Scheduled => self.scheduled,
            QueueKind::Retry => self.retry,
            QueueKind::Dead => self.dead,
        }
    }

    /// Returns the total number of tasks in all queues.
    pub fn total(&self) -> u64 {
        QueueKind::ALL.iter().map(|queue| self.count(*queue)).sum()
    }
}

impl Inspector {
    /// Counts the tasks in every queue.
    ///
    /// All five length queries go out together in a single pipeline.
    pub async fn current_stats(&self) -> Result<QueueStats> {
        let mut conn = self.conn();

        let mut pipe = redis::pipe();
        pipe.llen(QueueKind::Pending.key())
            .llen(QueueKind::Active.key())
            .zcard(QueueKind::Scheduled.key())
            .zcard(QueueKind::Retry.key())
            .zcard(QueueKind::Dead.key());
        let (pending, active, scheduled, retry, dead): (u64, u64, u64, u64, u64) =
            pipe.query_async(&mut conn).await?;

        let stats = QueueStats {
            pending,
            active,
            scheduled,
            retry,
            dead,
            captured_at: Utc::now(),
        };

        metrics::record_stats(&stats);
        debug!(pending, active, scheduled, retry, dead, "Fetched queue stats");
        Ok(stats)
    }

    /// Fetches the Redis `INFO` report as key/value pairs.
    ///
    /// See [`parse_info`] for which lines are kept.
    pub async fn backing_store_info(&self) -> Result<HashMap<String, String>> {
        let mut conn = self.conn();
        let report: String = redis::cmd("INFO").query_async(&mut conn).await?;

        let info = parse_info(&report);
        debug!(fields = info.len(), "Fetched Redis INFO");
        Ok(info)
    }
}

/// Parses a Redis `INFO` report.
///
/// The report is CRLF-separated. A line is kept only when splitting it on `:`
/// yields exactly two parts; section headers, blank lines and values that
/// themselves contain `:` are dropped.
pub fn parse_info(report: &str) -> HashMap<String, String> {
    report
        .split("\r\n")
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(':').collect();
            match parts.as_slice() {
                [key, value] => Some((key.to_string(), value.to_string())),
                _ => None,
            }
        })
        .collect()
}
