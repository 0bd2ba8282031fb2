//! Task record codec.
//!
//! A stored entry is UTF-8 JSON with the field names producers and workers
//! agree on:
//!
//! ```text
//! {"ID":"c0ffee...","Type":"send_email","Payload":{...},"ErrorMsg":"","Retry":25,"Retried":0}
//! ```
//!
//! This module is the only place that interprets raw entry bytes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{InspectorError, Result};

/// Opaque task payload.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Textual form of the 20-byte, time-sortable task identifier.
///
/// Identifiers are generated by producers; the inspector only compares them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TaskId {
    type Err = EmptyTaskId;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EmptyTaskId);
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Returned when parsing an empty task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Task ID cannot be empty")]
pub struct EmptyTaskId;

/// The persisted unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique identifier, immutable after creation.
    #[serde(rename = "ID")]
    pub id: TaskId,
    /// Name of the handler that processes this task.
    #[serde(rename = "Type")]
    pub task_type: String,
    /// Handler arguments, never interpreted here.
    #[serde(rename = "Payload", default, deserialize_with = "payload_or_empty")]
    pub payload: Payload,
    /// Last failure reported by a worker; empty if the task never failed.
    #[serde(rename = "ErrorMsg", default)]
    pub error_msg: String,
    /// Maximum number of retry attempts.
    #[serde(rename = "Retry", default)]
    pub retry_limit: i64,
    /// Number of attempts already made.
    #[serde(rename = "Retried", default)]
    pub retry_count: i64,
}

impl TaskRecord {
    pub fn new(id: impl Into<TaskId>, task_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            payload: Payload::new(),
            error_msg: String::new(),
            retry_limit: 0,
            retry_count: 0,
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = msg.into();
        self
    }

    pub fn with_retry_limit(mut self, limit: i64) -> Self {
        self.retry_limit = limit;
        self
    }

    pub fn with_retry_count(mut self, count: i64) -> Self {
        self.retry_count = count;
        self
    }
}

// Producers that never set a payload write `null`.
fn payload_or_empty<'de, D>(deserializer: D) -> std::result::Result<Payload, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Payload>::deserialize(deserializer)?.unwrap_or_default())
}

/// Encodes a record into the bytes stored in a queue.
pub fn encode(record: &TaskRecord) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(record)?)
}

/// Decodes stored bytes into a record.
///
/// # Errors
///
/// Returns `InspectorError::MalformedRecord` if the bytes are not UTF-8 JSON
/// describing a record.
pub fn decode(bytes: &[u8]) -> Result<TaskRecord> {
    serde_json::from_slice(bytes).map_err(InspectorError::MalformedRecord)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> TaskRecord {
        let mut payload = Payload::new();
        payload.insert("user_id".to_string(), json!(42));
        payload.insert("tags".to_string(), json!(["a", "b"]));
        TaskRecord::new("b50rsv3ktj6vp1f7jnmg", "send_email")
            .with_payload(payload)
            .with_error_msg("smtp timeout")
            .with_retry_limit(25)
            .with_retry_count(3)
    }

    #[test]
    fn test_encode_uses_wire_field_names() {
        let bytes = encode(&sample_record()).expect("encode should succeed");
        let value: serde_json::Value = serde_json::from_slice(&bytes).expect("valid json");

        assert_eq!(value["ID"], "b50rsv3ktj6vp1f7jnmg");
        assert_eq!(value["Type"], "send_email");
        assert_eq!(value["Payload"]["user_id"], 42);
        assert_eq!(value["ErrorMsg"], "smtp timeout");
        assert_eq!(value["Retry"], 25);
        assert_eq!(value["Retried"], 3);
    }

    #[test]
    fn test_decode_encoded_record() {
        let record = sample_record();
        let bytes = encode(&record).expect("encode should succeed");
        assert_eq!(decode(&bytes).expect("decode should succeed"), record);
    }

    #[test]
    fn test_decode_producer_entry_without_failure_fields() {
        let raw = br#"{"ID":"b50rsv3ktj6vp1f7jnmg","Type":"resize","Payload":{"w":100}}"#;
        let record = decode(raw).expect("decode should succeed");

        assert_eq!(record.id.as_str(), "b50rsv3ktj6vp1f7jnmg");
        assert_eq!(record.task_type, "resize");
        assert_eq!(record.payload["w"], 100);
        assert!(record.error_msg.is_empty());
        assert_eq!(record.retry_limit, 0);
        assert_eq!(record.retry_count, 0);
    }

    #[test]
    fn test_decode_null_payload() {
        let raw = br#"{"ID":"x","Type":"noop","Payload":null,"ErrorMsg":"","Retry":0,"Retried":0}"#;
        let record = decode(raw).expect("decode should succeed");
        assert!(record.payload.is_empty());
    }

    #[test]
    fn test_decode_malformed_entries() {
        let cases: [&[u8]; 6] = [
            b"not json",
            b"[1,2,3]",
            br#"{"Type":"missing_id"}"#,
            br#"{"ID":"x"}"#,
            br#"{"ID":"x","Type":"t","Retry":"many"}"#,
            &[0xff, 0xfe, 0x00],
        ];

        for raw in cases {
            let err = decode(raw).expect_err("malformed entry should not decode");
            assert!(
                matches!(err, InspectorError::MalformedRecord(_)),
                "unexpected error: {err:?}"
            );
        }
    }

    #[test]
    fn test_task_id_parse() {
        assert_eq!(
            " b50rsv3ktj6vp1f7jnmg ".parse::<TaskId>(),
            Ok(TaskId::new("b50rsv3ktj6vp1f7jnmg"))
        );
        assert_eq!("".parse::<TaskId>(), Err(EmptyTaskId));
        assert_eq!("   ".parse::<TaskId>(), Err(EmptyTaskId));
    }
}
