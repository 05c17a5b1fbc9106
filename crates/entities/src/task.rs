//! TaskItem entity definitions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status assigned to newly created tasks that carry no explicit status.
pub const DEFAULT_TASK_STATUS: &str = "pending";

/// A single task captured from a TaskCreate or TaskUpdate event.
///
/// Field names on the wire follow the task tools' own camelCase keys
/// (`activeForm`, `blockedBy`). Identity is assigned by the caller and is not
/// enforced unique anywhere in the storage layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskItem {
    /// Task identifier (TaskUpdate's `taskId`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Task title.
    pub subject: String,
    /// Long-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form status, e.g. "pending", "in_progress", "completed".
    pub status: String,
    /// Present continuous label shown while the task runs.
    #[serde(rename = "activeForm")]
    pub active_form: String,
    /// Agent or user the task is assigned to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Task IDs this task blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<String>>,
    /// Task IDs blocking this task.
    #[serde(rename = "blockedBy", skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<Vec<String>>,
    /// Arbitrary JSON key/value data attached to the task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl TaskItem {
    /// Creates a task with the given subject and status.
    pub fn new(subject: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            status: status.into(),
            ..Self::default()
        }
    }

    /// Sets the task identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the active form label
    pub fn with_active_form(mut self, active_form: impl Into<String>) -> Self {
        self.active_form = active_form.into();
        self
    }

    /// Sets the owner
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Sets the IDs this task blocks
    pub fn with_blocks<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocks = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the IDs blocking this task
    pub fn with_blocked_by<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_by = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the metadata map
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
