//! Atomic state transitions out of the Scheduled, Retry and Dead queues.
//!
//! Redis sorted sets are indexed by score only, so finding a task by ID means
//! scanning every member at that score and comparing decoded IDs. The scan and
//! the write that follows must not be split across round trips: a worker or
//! producer could mutate the set in between, losing the task or moving it
//! twice. Every primitive here therefore runs as one Lua script.
//!
//! Moved entries are pushed to Pending as the exact bytes that were stored, so
//! fields this crate does not model survive the move.
//!
//! If more than one member carries the same `(score, ID)` pair, only the first
//! one returned by the scan is acted upon.

use std::sync::OnceLock;

use redis::{AsyncCommands, Script, Value};
use tracing::{debug, info};

use super::Inspector;
use crate::error::{InspectorError, Result};
use crate::metrics;
use crate::queue::topology::PENDING_KEY;
use crate::queue::{RecoverableQueue, TaskId};

/// Moves the member at `score` whose ID matches to the head of Pending.
///
/// `KEYS[1]` -> source sorted set
/// `KEYS[2]` -> pending list
/// `ARGV[1]` -> score
/// `ARGV[2]` -> task ID
///
/// Returns 1 if a member was moved, 0 otherwise.
const MATCH_AND_MOVE_LUA: &str = r#"
local entries = redis.call("ZRANGEBYSCORE", KEYS[1], ARGV[1], ARGV[1])
for _, entry in ipairs(entries) do
    local ok, task = pcall(cjson.decode, entry)
    if ok and type(task) == "table" and task["ID"] == ARGV[2] then
        redis.call("ZREM", KEYS[1], entry)
        redis.call("LPUSH", KEYS[2], entry)
        return 1
    end
end
return 0
"#;

/// Moves every member of a sorted set to the head of Pending.
///
/// `KEYS[1]` -> source sorted set
/// `KEYS[2]` -> pending list
///
/// Returns the number of members moved.
const DRAIN_AND_MOVE_ALL_LUA: &str = r#"
local entries = redis.call("ZRANGE", KEYS[1], 0, -1)
for _, entry in ipairs(entries) do
    redis.call("LPUSH", KEYS[2], entry)
end
redis.call("DEL", KEYS[1])
return #entries
"#;

/// Removes the member at `score` whose ID matches.
///
/// `KEYS[1]` -> source sorted set
/// `ARGV[1]` -> score
/// `ARGV[2]` -> task ID
///
/// Returns 1 if a member was removed, 0 otherwise.
const MATCH_AND_DELETE_LUA: &str = r#"
local entries = redis.call("ZRANGEBYSCORE", KEYS[1], ARGV[1], ARGV[1])
for _, entry in ipairs(entries) do
    local ok, task = pcall(cjson.decode, entry)
    if ok and type(task) == "table" and task["ID"] == ARGV[2] then
        redis.call("ZREM", KEYS[1], entry)
        return 1
    end
end
return 0
"#;

static MATCH_AND_MOVE: OnceLock<Script> = OnceLock::new();
static DRAIN_AND_MOVE_ALL: OnceLock<Script> = OnceLock::new();
static MATCH_AND_DELETE: OnceLock<Script> = OnceLock::new();

fn match_and_move_script() -> &'static Script {
    MATCH_AND_MOVE.get_or_init(|| Script::new(MATCH_AND_MOVE_LUA))
}

fn drain_and_move_all_script() -> &'static Script {
    DRAIN_AND_MOVE_ALL.get_or_init(|| Script::new(DRAIN_AND_MOVE_ALL_LUA))
}

fn match_and_delete_script() -> &'static Script {
    MATCH_AND_DELETE.get_or_init(|| Script::new(MATCH_AND_DELETE_LUA))
}

impl Inspector {
    /// Moves a scheduled task to Pending.
    ///
    /// # Errors
    ///
    /// Returns `InspectorError::TaskNotFound` if no scheduled task has this ID at this score.
    pub async fn requeue_scheduled(&self, id: &TaskId, score: f64) -> Result<()> {
        self.requeue(RecoverableQueue::Scheduled, id, score).await
    }

    /// Moves a retry task to Pending.
    ///
    /// # Errors
    ///
    /// Returns `InspectorError::TaskNotFound` if no retry task has this ID at this score.
    pub async fn requeue_retry(&self, id: &TaskId, score: f64) -> Result<()> {
        self.requeue(RecoverableQueue::Retry, id, score).await
    }

    /// Moves a dead task to Pending.
    ///
    /// # Errors
    ///
    /// Returns `InspectorError::TaskNotFound` if no dead task has this ID at this score.
    pub async fn requeue_dead(&self, id: &TaskId, score: f64) -> Result<()> {
        self.requeue(RecoverableQueue::Dead, id, score).await
    }

    /// Moves every scheduled task to Pending, returning how many were moved.
    pub async fn requeue_all_scheduled(&self) -> Result<u64> {
        self.requeue_all(RecoverableQueue::Scheduled).await
    }

    /// Moves every retry task to Pending, returning how many were moved.
    pub async fn requeue_all_retry(&self) -> Result<u64> {
        self.requeue_all(RecoverableQueue::Retry).await
    }

    /// Moves every dead task to Pending, returning how many were moved.
    pub async fn requeue_all_dead(&self) -> Result<u64> {
        self.requeue_all(RecoverableQueue::Dead).await
    }

    /// Permanently deletes a scheduled task.
    pub async fn delete_scheduled(&self, id: &TaskId, score: f64) -> Result<()> {
        self.delete(RecoverableQueue::Scheduled, id, score).await
    }

    /// Permanently deletes a retry task.
    pub async fn delete_retry(&self, id: &TaskId, score: f64) -> Result<()> {
        self.delete(RecoverableQueue::Retry, id, score).await
    }

    /// Permanently deletes a dead task.
    pub async fn delete_dead(&self, id: &TaskId, score: f64) -> Result<()> {
        self.delete(RecoverableQueue::Dead, id, score).await
    }

    /// Deletes the whole Scheduled queue. Succeeds on an empty queue.
    pub async fn purge_scheduled(&self) -> Result<()> {
        self.purge(RecoverableQueue::Scheduled).await
    }

    /// Deletes the whole Retry queue. Succeeds on an empty queue.
    pub async fn purge_retry(&self) -> Result<()> {
        self.purge(RecoverableQueue::Retry).await
    }

    /// Deletes the whole Dead queue. Succeeds on an empty queue.
    pub async fn purge_dead(&self) -> Result<()> {
        self.purge(RecoverableQueue::Dead).await
    }

    /// Moves the task with this ID and score from `queue` to Pending.
    ///
    /// # Errors
    ///
    /// Returns `InspectorError::TaskNotFound` if no entry matched; queues are left untouched.
    pub async fn requeue(&self, queue: RecoverableQueue, id: &TaskId, score: f64) -> Result<()> {
        ensure_matchable(queue, id, score)?;
        let moved = self.match_and_move(queue, id, score).await?;
        if moved == 0 {
            return Err(not_found(queue, id, score));
        }

        metrics::record_requeued(queue, moved);
        info!(queue = %queue, id = %id, score, "Requeued task to pending");
        Ok(())
    }

    /// Moves every task in `queue` to Pending.
    ///
    /// Tasks added to `queue` by other clients while this runs may or may not
    /// be included.
    pub async fn requeue_all(&self, queue: RecoverableQueue) -> Result<u64> {
        let moved = self.drain_and_move_all(queue).await?;

        metrics::record_requeued(queue, moved);
        info!(queue = %queue, moved, "Requeued all tasks to pending");
        Ok(moved)
    }

    /// Permanently deletes the task with this ID and score from `queue`.
    ///
    /// # Errors
    ///
    /// Returns `InspectorError::TaskNotFound` if no entry matched.
    pub async fn delete(&self, queue: RecoverableQueue, id: &TaskId, score: f64) -> Result<()> {
        ensure_matchable(queue, id, score)?;
        if !self.match_and_delete(queue, id, score).await? {
            return Err(not_found(queue, id, score));
        }

        metrics::record_deleted(queue);
        info!(queue = %queue, id = %id, score, "Deleted task");
        Ok(())
    }

    /// Deletes the whole key backing `queue`, regardless of its contents.
    pub async fn purge(&self, queue: RecoverableQueue) -> Result<()> {
        let mut conn = self.conn();
        let removed: u64 = conn.del(queue.key()).await?;

        metrics::record_purged(queue);
        info!(queue = %queue, key_existed = removed > 0, "Purged queue");
        Ok(())
    }

    async fn match_and_move(
        &self,
        queue: RecoverableQueue,
        id: &TaskId,
        score: f64,
    ) -> Result<u64> {
        let mut conn = self.conn();
        let reply: Value = match_and_move_script()
            .key(queue.key())
            .key(PENDING_KEY)
            .arg(score)
            .arg(id.as_str())
            .invoke_async(&mut conn)
            .await?;

        debug!(queue = %queue, id = %id, score, "Ran match-and-move script");
        count_reply("match-and-move", reply)
    }

    async fn drain_and_move_all(&self, queue: RecoverableQueue) -> Result<u64> {
        let mut conn = self.conn();
        let reply: Value = drain_and_move_all_script()
            .key(queue.key())
            .key(PENDING_KEY)
            .invoke_async(&mut conn)
            .await?;

        debug!(queue = %queue, "Ran drain-and-move-all script");
        count_reply("drain-and-move-all", reply)
    }

    async fn match_and_delete(
        &self,
        queue: RecoverableQueue,
        id: &TaskId,
        score: f64,
    ) -> Result<bool> {
        let mut conn = self.conn();
        let reply: Value = match_and_delete_script()
            .key(queue.key())
            .arg(score)
            .arg(id.as_str())
            .invoke_async(&mut conn)
            .await?;

        debug!(queue = %queue, id = %id, score, "Ran match-and-delete script");
        Ok(count_reply("match-and-delete", reply)? > 0)
    }
}

fn not_found(queue: RecoverableQueue, id: &TaskId, score: f64) -> InspectorError {
    InspectorError::TaskNotFound {
        queue: queue.kind(),
        id: id.clone(),
        score,
    }
}

/// No member can carry a NaN score, and Redis rejects it as a range bound.
fn ensure_matchable(queue: RecoverableQueue, id: &TaskId, score: f64) -> Result<()> {
    if score.is_nan() {
        return Err(not_found(queue, id, score));
    }
    Ok(())
}

/// Interprets a script reply as a non-negative count.
fn count_reply(operation: &'static str, reply: Value) -> Result<u64> {
    match reply {
        Value::Int(n) if n >= 0 => Ok(n as u64),
        other => Err(InspectorError::UnexpectedResultShape {
            operation,
            detail: format!("expected a non-negative integer, got {:?}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_reply_accepts_integers() {
        assert_eq!(count_reply("test", Value::Int(0)).expect("count"), 0);
        assert_eq!(count_reply("test", Value::Int(7)).expect("count"), 7);
    }

    #[test]
    fn test_count_reply_rejects_other_shapes() {
        for reply in [Value::Nil, Value::Okay, Value::Int(-1), Value::Data(b"1".to_vec())] {
            let err = count_reply("match-and-move", reply).expect_err("should be rejected");
            assert!(matches!(
                err,
                InspectorError::UnexpectedResultShape {
                    operation: "match-and-move",
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_not_found_names_queue_and_id() {
        let err = not_found(RecoverableQueue::Retry, &TaskId::new("abc"), 12.5);
        let msg = err.to_string();
        assert!(msg.contains("retry"));
        assert!(msg.contains("abc"));
        assert!(msg.contains("12.5"));
    }

    #[test]
    fn test_nan_score_is_not_found() {
        let id = TaskId::new("abc");
        let err = ensure_matchable(RecoverableQueue::Dead, &id, f64::NAN)
            .expect_err("NaN score cannot match");
        assert!(err.is_not_found());
        assert!(!err.is_transport());

        assert!(ensure_matchable(RecoverableQueue::Dead, &id, 1_700_000_000.0).is_ok());
        assert!(ensure_matchable(RecoverableQueue::Retry, &id, f64::INFINITY).is_ok());
    }

    #[test]
    fn test_scripts_only_push_to_pending_head() {
        for lua in [MATCH_AND_MOVE_LUA, DRAIN_AND_MOVE_ALL_LUA] {
            assert!(lua.contains("LPUSH"));
            assert!(!lua.contains("RPUSH"));
        }
        assert!(!MATCH_AND_DELETE_LUA.contains("PUSH"));
    }
}
