//! Error types for queue inspection and recovery.
//!
//! Every operation returns its error to the immediate caller. Nothing is
//! retried internally and no primitive leaves a partial effect behind.

use thiserror::Error;

use crate::queue::{QueueKind, TaskId};

/// Errors that can occur while inspecting or mutating queue state.
#[derive(Debug, Error)]
pub enum InspectorError {
    /// Failed to open a connection to Redis.
    #[error("Redis connection failed: {0}")]
    ConnectionFailed(String),

    /// Redis was unreachable or replied with a protocol-level error.
    #[error("Redis operation failed: {0}")]
    Transport(#[from] redis::RedisError),

    /// Stored bytes are not a valid task record.
    #[error("Malformed task record: {0}")]
    MalformedRecord(#[from] serde_json::Error),

    /// No entry with this ID exists at this score.
    #[error("Task {id} not found in {queue} queue at score {score}")]
    TaskNotFound {
        queue: QueueKind,
        id: TaskId,
        score: f64,
    },

    /// A script or command returned a value of the wrong type.
    #[error("Unexpected result from {operation}: {detail}")]
    UnexpectedResultShape {
        operation: &'static str,
        detail: String,
    },
}

impl InspectorError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, InspectorError::TaskNotFound { .. })
    }

    /// Whether the failure came from reaching the store rather than from its contents.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            InspectorError::ConnectionFailed(_) | InspectorError::Transport(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, InspectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspector_error_display() {
        let err = InspectorError::ConnectionFailed("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
        assert!(err.is_transport());

        let err = InspectorError::TaskNotFound {
            queue: QueueKind::Dead,
            id: TaskId::new("b50rsv3ktj6vp1f7jnmg"),
            score: 1_700_000_000.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("b50rsv3ktj6vp1f7jnmg"));
        assert!(msg.contains("dead"));
        assert!(err.is_not_found());
        assert!(!err.is_transport());

        let err = InspectorError::UnexpectedResultShape {
            operation: "requeue",
            detail: "status reply".to_string(),
        };
        assert!(err.to_string().contains("requeue"));
    }

    #[test]
    fn test_malformed_record_from_serde() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = InspectorError::from(source);
        assert!(matches!(err, InspectorError::MalformedRecord(_)));
        assert!(!err.is_not_found());
    }
}
