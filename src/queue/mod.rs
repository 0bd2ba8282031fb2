//! Queue state model shared with producers and workers.
//!
//! - **topology**: the five lifecycle queues and the Redis keys backing them
//! - **codec**: the JSON encoding of a task record stored in those keys

pub mod codec;
pub mod topology;

pub use codec::{decode, encode, EmptyTaskId, Payload, TaskId, TaskRecord};
pub use topology::{QueueKind, QueueShape, RecoverableQueue, UnknownQueue};
