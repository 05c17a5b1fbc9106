//! LogEntry entity definitions.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::TaskItem;

/// Fallback used by the hook layer when `session_id` or `cwd` is missing.
pub const UNKNOWN_VALUE: &str = "unknown";

/// Returns the current UTC time as ISO 8601 with millisecond precision,
/// e.g. `2025-11-14T10:30:45.123Z`.
pub fn utc_iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// A timestamped record of a single task event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp with a `Z` suffix.
    pub timestamp: String,
    /// Session the event came from.
    pub session_id: String,
    /// Working directory the tool was invoked in.
    pub cwd: String,
    /// Tool that produced the event, e.g. "TaskCreate".
    pub tool_name: String,
    /// Task data carried by the event.
    pub task: TaskItem,
}

impl LogEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(
        session_id: impl Into<String>,
        cwd: impl Into<String>,
        tool_name: impl Into<String>,
        task: TaskItem,
    ) -> Self {
        Self {
            timestamp: utc_iso_timestamp(),
            session_id: session_id.into(),
            cwd: cwd.into(),
            tool_name: tool_name.into(),
            task,
        }
    }

    /// Overrides the timestamp
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }
}
