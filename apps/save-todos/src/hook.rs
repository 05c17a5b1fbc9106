//! Hook event parsing

use std::io::Read;

use entities::{LogEntry, TaskItem, DEFAULT_TASK_STATUS, UNKNOWN_VALUE};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Tool that creates a task
pub const TASK_CREATE: &str = "TaskCreate";
/// Tool that updates a task
pub const TASK_UPDATE: &str = "TaskUpdate";

/// Errors while reading a hook event
#[derive(Debug, Error)]
pub enum HookError {
    /// Input is not a valid hook payload
    #[error("failed to decode hook input: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Payload delivered on stdin after a tool call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HookInput {
    /// Tool that was invoked, e.g. "TaskCreate"
    pub tool_name: String,
    /// Raw parameters the tool was called with
    pub tool_input: Option<Value>,
    /// Session the tool call belongs to
    pub session_id: String,
    /// Working directory of the tool call
    pub cwd: String,
}

impl HookInput {
    /// Whether the event carries a task
    pub fn is_task_event(&self) -> bool {
        matches!(self.tool_name.as_str(), TASK_CREATE | TASK_UPDATE)
    }
}

/// Reads one hook event. Events from other tools yield `Ok(None)`.
pub fn read_hook_input<R: Read>(reader: R) -> Result<Option<HookInput>, HookError> {
    let input: HookInput = serde_json::from_reader(reader)?;

    if !input.is_task_event() {
        tracing::debug!(tool = %input.tool_name, "ignoring non-task event");
        return Ok(None);
    }

    Ok(Some(input))
}

/// Extracts the task fields from a tool's input.
///
/// `taskId`, `addBlocks` and `addBlockedBy` map to `id`, `blocks` and
/// `blocked_by`. Fields of the wrong type are skipped. A create without a
/// status starts out pending.
pub fn parse_task_input(tool_name: &str, raw: Option<&Value>) -> TaskItem {
    let Some(fields) = raw.and_then(Value::as_object) else {
        return TaskItem {
            status: DEFAULT_TASK_STATUS.to_string(),
            ..Default::default()
        };
    };

    let string_field = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);

    let mut task = TaskItem {
        id: string_field("taskId"),
        subject: string_field("subject").unwrap_or_default(),
        description: string_field("description"),
        status: string_field("status").unwrap_or_default(),
        active_form: string_field("activeForm").unwrap_or_default(),
        owner: string_field("owner"),
        blocks: fields.get("addBlocks").and_then(string_list),
        blocked_by: fields.get("addBlockedBy").and_then(string_list),
        metadata: fields.get("metadata").and_then(Value::as_object).cloned(),
    };

    if tool_name == TASK_CREATE && task.status.is_empty() {
        task.status = DEFAULT_TASK_STATUS.to_string();
    }

    task
}

/// Keeps the string elements of an array; `None` when nothing is left.
fn string_list(value: &Value) -> Option<Vec<String>> {
    let items: Vec<String> = value
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();

    (!items.is_empty()).then_some(items)
}

/// Builds the log entry for a task event, stamped with the current time.
pub fn build_log_entry(input: &HookInput) -> LogEntry {
    let or_unknown = |value: &str| {
        if value.is_empty() {
            UNKNOWN_VALUE.to_string()
        } else {
            value.to_string()
        }
    };

    LogEntry::new(
        or_unknown(&input.session_id),
        or_unknown(&input.cwd),
        input.tool_name.as_str(),
        parse_task_input(&input.tool_name, input.tool_input.as_ref()),
    )
}
