//! Inspection and recovery operations against live queue state.
//!
//! The inspector observes and corrects the queues that producers and workers
//! mutate concurrently. It holds no state of its own between calls; every
//! operation is a function of the Redis handle and its arguments.
//!
//! - **listing**: read-only per-queue listings translated into view records
//! - **transition**: atomic requeue, delete and purge primitives (Lua scripts)
//! - **stats**: batched queue counts and the Redis `INFO` report
//!
//! # Example
//!
//! ```rust,ignore
//! use queue_inspector::inspector::Inspector;
//!
//! let inspector = Inspector::connect("redis://localhost:6379").await?;
//!
//! let stats = inspector.current_stats().await?;
//! println!("{} dead tasks", stats.dead);
//!
//! for task in inspector.list_dead().await? {
//!     inspector.requeue_dead(&task.id, task.score).await?;
//! }
//! ```
//!
//! # Consistency
//!
//! Listings and stats are best-effort point-in-time views. Each transition is
//! a single server-side script and therefore atomic on its own, but two calls
//! are never atomic together.

pub mod listing;
pub mod stats;
pub mod transition;

use redis::aio::ConnectionManager;
use tracing::debug;

use crate::error::{InspectorError, Result};

pub use listing::{ActiveTask, DeadTask, PendingTask, RetryTask, ScheduledTask};
pub use stats::{parse_info, QueueStats};

/// Handle for inspecting and recovering queue state in Redis.
///
/// Cloning is cheap; clones share the underlying multiplexed connection.
#[derive(Clone)]
pub struct Inspector {
    /// Redis connection manager (handles reconnection automatically).
    redis: ConnectionManager,
}

impl Inspector {
    /// Connects to Redis and creates a new inspector.
    ///
    /// # Errors
    ///
    /// Returns `InspectorError::ConnectionFailed` if the connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| InspectorError::ConnectionFailed(e.to_string()))?;

        let redis = ConnectionManager::new(client)
            .await
            .map_err(|e| InspectorError::ConnectionFailed(e.to_string()))?;

        debug!("Connected to Redis");
        Ok(Self { redis })
    }

    /// Creates an inspector from an existing ConnectionManager.
    pub fn from_connection(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    pub(crate) fn conn(&self) -> ConnectionManager {
        self.redis.clone()
    }
}
