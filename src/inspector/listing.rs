//! Read-only queue listings.
//!
//! Each listing reads the full contents of one key in a single round trip and
//! translates the entries into view records. The result is not a transactional
//! snapshot; producers and workers may change the queue before or after the
//! read.
//!
//! Malformed entries are handled differently per queue: the Pending listing
//! fails with `MalformedRecord`, every other listing logs and skips the entry.

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::Serialize;
use tracing::{debug, warn};

use super::Inspector;
use crate::error::Result;
use crate::queue::{codec, Payload, QueueKind, RecoverableQueue, TaskId, TaskRecord};

/// A task waiting in the Pending queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingTask {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: String,
    pub payload: Payload,
}

/// A task currently claimed by a worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveTask {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: String,
    pub payload: Payload,
}

/// A task scheduled to become pending at `process_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledTask {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: String,
    pub payload: Payload,
    pub process_at: DateTime<Utc>,
    /// Raw sorted-set score, needed to requeue or delete this entry.
    pub score: f64,
}

/// A failed task waiting for its next attempt at `process_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryTask {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: String,
    pub payload: Payload,
    pub process_at: DateTime<Utc>,
    pub score: f64,
    pub error_msg: String,
    pub retry_count: i64,
    pub retry_limit: i64,
}

/// A task that exhausted its retries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadTask {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: String,
    pub payload: Payload,
    pub last_failed_at: DateTime<Utc>,
    pub score: f64,
    pub error_msg: String,
}

impl From<TaskRecord> for PendingTask {
    fn from(record: TaskRecord) -> Self {
        Self {
            id: record.id,
            task_type: record.task_type,
            payload: record.payload,
        }
    }
}

impl From<TaskRecord> for ActiveTask {
    fn from(record: TaskRecord) -> Self {
        Self {
            id: record.id,
            task_type: record.task_type,
            payload: record.payload,
        }
    }
}

impl ScheduledTask {
    fn from_record(record: TaskRecord, score: f64) -> Self {
        Self {
            id: record.id,
            task_type: record.task_type,
            payload: record.payload,
            process_at: score_to_time(score),
            score,
        }
    }
}

impl RetryTask {
    fn from_record(record: TaskRecord, score: f64) -> Self {
        Self {
            id: record.id,
            task_type: record.task_type,
            payload: record.payload,
            process_at: score_to_time(score),
            score,
            error_msg: record.error_msg,
            retry_count: record.retry_count,
            retry_limit: record.retry_limit,
        }
    }
}

impl DeadTask {
    fn from_record(record: TaskRecord, score: f64) -> Self {
        Self {
            id: record.id,
            task_type: record.task_type,
            payload: record.payload,
            last_failed_at: score_to_time(score),
            score,
            error_msg: record.error_msg,
        }
    }
}

impl Inspector {
    /// Lists tasks in the Pending queue in list order.
    ///
    /// # Errors
    ///
    /// Fails with `MalformedRecord` if any entry cannot be decoded; no partial
    /// listing is returned in that case.
    pub async fn list_pending(&self) -> Result<Vec<PendingTask>> {
        let entries = self.list_entries(QueueKind::Pending).await?;
        pending_views(&entries)
    }

    /// Lists tasks in the Active queue, skipping malformed entries.
    pub async fn list_active(&self) -> Result<Vec<ActiveTask>> {
        let entries = self.list_entries(QueueKind::Active).await?;
        Ok(active_views(&entries))
    }

    /// Lists scheduled tasks in ascending `process_at` order, skipping malformed entries.
    pub async fn list_scheduled(&self) -> Result<Vec<ScheduledTask>> {
        let entries = self.scored_entries(RecoverableQueue::Scheduled).await?;
        Ok(scheduled_views(&entries))
    }

    /// Lists retry tasks in ascending next-attempt order, skipping malformed entries.
    pub async fn list_retry(&self) -> Result<Vec<RetryTask>> {
        let entries = self.scored_entries(RecoverableQueue::Retry).await?;
        Ok(retry_views(&entries))
    }

    /// Lists dead tasks in ascending failure-time order, skipping malformed entries.
    pub async fn list_dead(&self) -> Result<Vec<DeadTask>> {
        let entries = self.scored_entries(RecoverableQueue::Dead).await?;
        Ok(dead_views(&entries))
    }

    async fn list_entries(&self, queue: QueueKind) -> Result<Vec<Vec<u8>>> {
        let mut conn = self.conn();
        let entries: Vec<Vec<u8>> = conn.lrange(queue.key(), 0, -1).await?;
        debug!(queue = %queue, entries = entries.len(), "Read list queue");
        Ok(entries)
    }

    async fn scored_entries(&self, queue: RecoverableQueue) -> Result<Vec<(Vec<u8>, f64)>> {
        let mut conn = self.conn();
        let entries: Vec<(Vec<u8>, f64)> = conn.zrange_withscores(queue.key(), 0, -1).await?;
        debug!(queue = %queue, entries = entries.len(), "Read sorted-set queue");
        Ok(entries)
    }
}

fn pending_views(entries: &[Vec<u8>]) -> Result<Vec<PendingTask>> {
    entries
        .iter()
        .map(|bytes| codec::decode(bytes).map(PendingTask::from))
        .collect()
}

fn active_views(entries: &[Vec<u8>]) -> Vec<ActiveTask> {
    entries
        .iter()
        .filter_map(|bytes| decode_or_skip(QueueKind::Active, bytes))
        .map(ActiveTask::from)
        .collect()
}

fn scheduled_views(entries: &[(Vec<u8>, f64)]) -> Vec<ScheduledTask> {
    entries
        .iter()
        .filter_map(|(bytes, score)| {
            decode_or_skip(QueueKind::Scheduled, bytes)
                .map(|record| ScheduledTask::from_record(record, *score))
        })
        .collect()
}

fn retry_views(entries: &[(Vec<u8>, f64)]) -> Vec<RetryTask> {
    entries
        .iter()
        .filter_map(|(bytes, score)| {
            decode_or_skip(QueueKind::Retry, bytes)
                .map(|record| RetryTask::from_record(record, *score))
        })
        .collect()
}

fn dead_views(entries: &[(Vec<u8>, f64)]) -> Vec<DeadTask> {
    entries
        .iter()
        .filter_map(|(bytes, score)| {
            decode_or_skip(QueueKind::Dead, bytes)
                .map(|record| DeadTask::from_record(record, *score))
        })
        .collect()
}

fn decode_or_skip(queue: QueueKind, bytes: &[u8]) -> Option<TaskRecord> {
    match codec::decode(bytes) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(queue = %queue, error = %e, "Skipping malformed task entry");
            None
        }
    }
}

/// Converts a unix-seconds score into a timestamp.
///
/// Scores beyond the representable range, including `inf` and `-inf`, clamp
/// to the latest or earliest representable time.
fn score_to_time(score: f64) -> DateTime<Utc> {
    let secs = score.floor();
    let nanos = ((score - secs) * 1e9).round().min(999_999_999.0) as u32;
    match DateTime::from_timestamp(secs as i64, nanos) {
        Some(at) => at,
        None if score > 0.0 => DateTime::<Utc>::MAX_UTC,
        None if score < 0.0 => DateTime::<Utc>::MIN_UTC,
        None => DateTime::<Utc>::default(),
    }
}
