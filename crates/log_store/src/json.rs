//! JSON file storage backend.

use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use entities::LogEntry;

use crate::{BackendKind, StorageBackend, StorageResult};

/// Stores the whole log as one pretty-printed JSON array.
///
/// Every append rewrites the file through a temporary sibling and an atomic
/// rename, so a crash mid-write leaves the previous version intact. The
/// read-modify-write cycle itself is not locked: two processes appending at
/// the same time can both read the same snapshot, and the last rename wins.
#[derive(Debug, Clone)]
pub struct JsonBackend {
    log_file: PathBuf,
}

impl JsonBackend {
    /// Creates a backend for the given log file. Nothing is touched on disk
    /// until the first append.
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            log_file: log_file.into(),
        }
    }

    /// Path of the JSON log file
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}

#[async_trait]
impl StorageBackend for JsonBackend {
    /// Missing, unreadable, malformed or non-array content all load as an
    /// empty history; this backend never reports a read error.
    async fn load_history(&self) -> StorageResult<Vec<LogEntry>> {
        let data = match tokio::fs::read(&self.log_file).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                tracing::warn!(
                    path = %self.log_file.display(),
                    error = %e,
                    "unreadable log file, starting fresh"
                );
                return Ok(Vec::new());
            }
        };

        match serde_json::from_slice::<Vec<LogEntry>>(&data) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(
                    path = %self.log_file.display(),
                    error = %e,
                    "malformed log file, starting fresh"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn append_entry(&self, entry: &LogEntry) -> StorageResult<()> {
        let dir = parent_dir(&self.log_file);
        tokio::fs::create_dir_all(&dir).await?;

        let mut history = self.load_history().await?;
        history.push(entry.clone());

        let mut data = serde_json::to_vec_pretty(&history)?;
        data.push(b'\n');

        let target = self.log_file.clone();
        tokio::task::spawn_blocking(move || write_atomically(&dir, &target, &data)).await??;

        tracing::debug!(
            path = %self.log_file.display(),
            entries = history.len(),
            tool = %entry.tool_name,
            "appended log entry"
        );
        Ok(())
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Json
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Writes `data` to a temp file in `dir` and renames it over `target`. The
/// temp file is removed on any failure.
fn write_atomically(dir: &Path, target: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp = tempfile::Builder::new().suffix(".tmp").tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use entities::TaskItem;
    use serde_json::{json, Map};
    use tempfile::TempDir;

    use super::*;

    fn entry(session: &str, subject: &str, status: &str) -> LogEntry {
        LogEntry::new(session, "/work", "TaskCreate", TaskItem::new(subject, status))
    }

    fn backend(dir: &TempDir) -> JsonBackend {
        JsonBackend::new(dir.path().join(".claude").join("todos.json"))
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let history = backend(&dir).load_history().await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_content_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("todos.json");
        let backend = JsonBackend::new(&path);

        for content in ["", "not json", "{\"a\":1}", "42", "null", "[{\"timestamp\":5}]"] {
            std::fs::write(&path, content).unwrap();
            let history = backend.load_history().await.unwrap();
            assert!(history.is_empty(), "expected empty history for {content:?}");
        }
    }

    #[tokio::test]
    async fn test_append_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let backend = JsonBackend::new(dir.path().join("a").join("b").join("todos.json"));

        backend.append_entry(&entry("s1", "Nested", "pending")).await.unwrap();
        assert!(backend.log_file().exists());
    }

    #[tokio::test]
    async fn test_write_tests_scenario() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);

        backend.append_entry(&entry("s1", "Write tests", "pending")).await.unwrap();

        let history = backend.load_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].task.subject, "Write tests");
        assert_eq!(history[0].session_id, "s1");
        let ts = history[0].timestamp.as_bytes();
        assert_eq!(ts.len(), 24);
        assert_eq!(ts[10], b'T');
        assert_eq!(ts[19], b'.');
        assert_eq!(ts[23], b'Z');
    }

    #[tokio::test]
    async fn test_round_trip_all_fields() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);

        let mut metadata = Map::new();
        metadata.insert("priority".to_string(), json!("high"));
        metadata.insert("estimate".to_string(), json!(3));
        let task = TaskItem::new("Implement feature", "in_progress")
            .with_id("7")
            .with_description("Full description")
            .with_active_form("Implementing feature")
            .with_owner("agent-1")
            .with_blocks(["8", "9"])
            .with_blocked_by(Vec::<String>::new())
            .with_metadata(metadata);
        let stored = LogEntry::new("s1", "/home/user/project", "TaskUpdate", task)
            .with_timestamp("2025-11-14T10:30:45.123Z");

        backend.append_entry(&stored).await.unwrap();

        let history = backend.load_history().await.unwrap();
        assert_eq!(history.last(), Some(&stored));
    }

    #[tokio::test]
    async fn test_preserves_insertion_order() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let entries = [
            entry("s1", "first", "pending"),
            entry("s2", "second", "pending"),
            entry("s1", "third", "completed"),
        ];

        for e in &entries {
            backend.append_entry(e).await.unwrap();
        }

        assert_eq!(backend.load_history().await.unwrap(), entries);
    }

    #[tokio::test]
    async fn test_append_recovers_from_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("todos.json");
        std::fs::write(&path, "{{{ garbage").unwrap();
        let backend = JsonBackend::new(&path);

        backend.append_entry(&entry("s1", "fresh", "pending")).await.unwrap();

        let history = backend.load_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].task.subject, "fresh");
    }

    #[tokio::test]
    async fn test_file_format() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        let task = TaskItem::new("Format", "pending").with_active_form("Formatting");

        backend
            .append_entry(&LogEntry::new("s1", "/w", "TaskCreate", task))
            .await
            .unwrap();

        let text = std::fs::read_to_string(backend.log_file()).unwrap();
        assert!(text.starts_with("[\n  {\n    \"timestamp\""), "{text}");
        assert!(text.ends_with("]\n"));
        assert!(text.contains("\"activeForm\": \"Formatting\""));
        assert!(text.contains("\"session_id\": \"s1\""));
        assert!(!text.starts_with('\u{feff}'));
    }

    #[tokio::test]
    async fn test_fresh_backend_reads_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("todos.json");
        JsonBackend::new(&path)
            .append_entry(&entry("s1", "persisted", "pending"))
            .await
            .unwrap();

        let history = JsonBackend::new(&path).load_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].task.subject, "persisted");
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let backend = JsonBackend::new(dir.path().join("todos.json"));
        backend.append_entry(&entry("s1", "a", "pending")).await.unwrap();
        backend.append_entry(&entry("s1", "b", "pending")).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["todos.json"]);
    }

    #[tokio::test]
    async fn test_not_queryable() {
        let dir = TempDir::new().unwrap();
        let backend = backend(&dir);
        assert!(backend.as_queryable().is_none());
        assert_eq!(backend.backend_kind(), BackendKind::Json);
    }
}
