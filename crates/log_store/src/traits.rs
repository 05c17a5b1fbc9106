//! Storage backend trait definitions.

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use entities::{LogEntry, TaskItem};
use serde::{Deserialize, Serialize};

use crate::{StorageError, StorageResult};

/// The closed set of storage engines a deployment can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Single JSON document rewritten on every append
    #[default]
    Json,
    /// Local SQLite database file
    Sqlite,
    /// Networked PostgreSQL database
    Postgres,
}

impl BackendKind {
    /// Canonical names accepted in configuration.
    pub const ACCEPTED: [&'static str; 3] = ["json", "sqlite", "postgres"];

    /// Converts the kind to its configuration name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }

    /// Parses a configuration value, ignoring case and surrounding whitespace.
    /// A blank value selects the default.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "json" | "file" => Some(Self::Json),
            "sqlite" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Whether this backend stores its data in a file under the project.
    pub fn is_file_based(&self) -> bool {
        matches!(self, Self::Json | Self::Sqlite)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| StorageError::UnknownBackend {
            value: s.trim().to_string(),
        })
    }
}

/// Contract every backend satisfies: read the full log, append one entry.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Loads every entry in insertion order. Never yields a partial list.
    async fn load_history(&self) -> StorageResult<Vec<LogEntry>>;

    /// Appends one entry. Either the whole entry is stored or nothing is.
    async fn append_entry(&self, entry: &LogEntry) -> StorageResult<()>;

    /// Which engine this is
    fn backend_kind(&self) -> BackendKind;

    /// Returns the query interface when the backend supports one.
    fn as_queryable(&self) -> Option<&dyn QueryableStorageBackend> {
        None
    }
}

/// Query capabilities offered by the SQL backends.
#[async_trait]
pub trait QueryableStorageBackend: StorageBackend {
    /// Entries whose session ID equals `session_id` exactly, in insertion order.
    async fn get_entries_by_session(&self, session_id: &str) -> StorageResult<Vec<LogEntry>>;

    /// Tasks whose status equals `status` exactly, in insertion order.
    async fn get_tasks_by_status(&self, status: &str) -> StorageResult<Vec<TaskItem>>;
}
