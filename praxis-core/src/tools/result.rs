//! Tool operation results
//!
//! Every operation returns a `ToolResult`; no failure ever crosses the
//! `Tool` boundary as a panic or an error type.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Outcome of a single tool operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the operation succeeded
    pub success: bool,

    /// Result payload (empty object/null on failure)
    pub data: Value,

    /// Human-readable failure description, empty on success
    #[serde(default)]
    pub error_message: String,

    /// Wall-clock time spent executing
    #[serde(with = "duration_millis")]
    pub execution_time: Duration,

    /// Number of retries performed before this outcome
    #[serde(default)]
    pub retry_count: u32,

    /// Free-form annotations attached by the executing tool
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ToolResult {
    /// Successful result with a payload
    pub fn ok(data: Value, execution_time: Duration) -> Self {
        Self {
            success: true,
            data,
            error_message: String::new(),
            execution_time,
            retry_count: 0,
            metadata: HashMap::new(),
        }
    }

    /// Failed result with an error message
    pub fn fail(error_message: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error_message: error_message.into(),
            execution_time,
            retry_count: 0,
            metadata: HashMap::new(),
        }
    }

    /// Set the retry count
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// Durations on the wire are integral milliseconds.
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
