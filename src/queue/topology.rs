//! Queue topology: the five lifecycle partitions and their Redis keys.
//!
//! Every task record lives in exactly one of these keys:
//!
//! | Queue     | Key               | Shape       | Score                  |
//! |-----------|-------------------|-------------|------------------------|
//! | Pending   | `queue:pending`   | list        | -                      |
//! | Active    | `queue:active`    | list        | -                      |
//! | Scheduled | `queue:scheduled` | sorted set  | process-at unix time   |
//! | Retry     | `queue:retry`     | sorted set  | next attempt unix time |
//! | Dead      | `queue:dead`      | sorted set  | last failure unix time |
//!
//! The key names are shared with producers and workers and must not change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Key of the list holding tasks ready to be claimed.
pub const PENDING_KEY: &str = "queue:pending";
/// Key of the list holding tasks currently claimed by a worker.
pub const ACTIVE_KEY: &str = "queue:active";
/// Key of the sorted set holding tasks scheduled for later.
pub const SCHEDULED_KEY: &str = "queue:scheduled";
/// Key of the sorted set holding tasks waiting for their next attempt.
pub const RETRY_KEY: &str = "queue:retry";
/// Key of the sorted set holding tasks that exhausted their retries.
pub const DEAD_KEY: &str = "queue:dead";

/// Storage shape of a queue key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueShape {
    /// Append-ordered Redis list.
    List,
    /// Score-ordered Redis sorted set.
    SortedSet,
}

/// One of the five lifecycle partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    Pending,
    Active,
    Scheduled,
    Retry,
    Dead,
}

impl QueueKind {
    /// All queues in lifecycle order.
    pub const ALL: [QueueKind; 5] = [
        QueueKind::Pending,
        QueueKind::Active,
        QueueKind::Scheduled,
        QueueKind::Retry,
        QueueKind::Dead,
    ];

    /// Redis key backing this queue.
    pub fn key(self) -> &'static str {
        match self {
            QueueKind::Pending => PENDING_KEY,
            QueueKind::Active => ACTIVE_KEY,
            QueueKind::Scheduled => SCHEDULED_KEY,
            QueueKind::Retry => RETRY_KEY,
            QueueKind::Dead => DEAD_KEY,
        }
    }

    pub fn shape(self) -> QueueShape {
        match self {
            QueueKind::Pending | QueueKind::Active => QueueShape::List,
            QueueKind::Scheduled | QueueKind::Retry | QueueKind::Dead => QueueShape::SortedSet,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueueKind::Pending => "pending",
            QueueKind::Active => "active",
            QueueKind::Scheduled => "scheduled",
            QueueKind::Retry => "retry",
            QueueKind::Dead => "dead",
        }
    }

    /// Returns the recoverable form of this queue, if tasks may be moved out of it.
    pub fn recoverable(self) -> Option<RecoverableQueue> {
        match self {
            QueueKind::Scheduled => Some(RecoverableQueue::Scheduled),
            QueueKind::Retry => Some(RecoverableQueue::Retry),
            QueueKind::Dead => Some(RecoverableQueue::Dead),
            QueueKind::Pending | QueueKind::Active => None,
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for QueueKind {
    type Err = UnknownQueue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(QueueKind::Pending),
            "active" => Ok(QueueKind::Active),
            "scheduled" => Ok(QueueKind::Scheduled),
            "retry" => Ok(QueueKind::Retry),
            "dead" => Ok(QueueKind::Dead),
            _ => Err(UnknownQueue(s.to_string())),
        }
    }
}

/// Returned when parsing a queue name that is not one of the five queues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown queue '{0}' (expected pending, active, scheduled, retry or dead)")]
pub struct UnknownQueue(pub String);

/// A sorted-set queue that the inspector may requeue from, delete from or purge.
///
/// Pending and Active are deliberately not representable here: the inspector
/// never removes records from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoverableQueue {
    Scheduled,
    Retry,
    Dead,
}

impl RecoverableQueue {
    pub const ALL: [RecoverableQueue; 3] = [
        RecoverableQueue::Scheduled,
        RecoverableQueue::Retry,
        RecoverableQueue::Dead,
    ];

    pub fn kind(self) -> QueueKind {
        QueueKind::from(self)
    }

    pub fn key(self) -> &'static str {
        self.kind().key()
    }
}

impl From<RecoverableQueue> for QueueKind {
    fn from(queue: RecoverableQueue) -> Self {
        match queue {
            RecoverableQueue::Scheduled => QueueKind::Scheduled,
            RecoverableQueue::Retry => QueueKind::Retry,
            RecoverableQueue::Dead => QueueKind::Dead,
        }
    }
}

impl fmt::Display for RecoverableQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind(), f)
    }
}

impl FromStr for RecoverableQueue {
    type Err = UnknownQueue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<QueueKind>()?
            .recoverable()
            .ok_or_else(|| UnknownQueue(s.to_string()))
    }
}
