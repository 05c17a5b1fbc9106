//! todo-log save hook
//!
//! Reads a PostToolUse event from stdin and appends TaskCreate/TaskUpdate
//! events to the configured log store.
//!
//! Exit codes:
//! - 0: task saved, or a non-task event was ignored
//! - 1: malformed input, missing project directory, or storage failure
//!
//! Environment:
//! - `CLAUDE_PROJECT_DIR` (required): root that custom storage paths must stay inside
//! - `TODO_STORAGE_BACKEND`, `TODO_LOG_PATH`, `TODO_SQLITE_PATH`, `TODO_POSTGRES_URL`
//! - `DEBUG`: any non-empty value turns on debug logging to stderr
//! - `RUST_LOG`: overrides the log filter entirely

use std::{io::Read, path::Path, process::ExitCode};

use anyhow::Context;
use log_store::{open_backend, StorageConfig};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod hook;

const PROJECT_DIR_ENV: &str = "CLAUDE_PROJECT_DIR";

/// The project directory was not provided for a task event.
#[derive(Debug, Error)]
#[error("{} not set", PROJECT_DIR_ENV)]
struct MissingProjectDir;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let project_dir = std::env::var(PROJECT_DIR_ENV).ok();
    let config = StorageConfig::from_env();

    match run(std::io::stdin().lock(), project_dir.as_deref(), &config).await {
        Ok(Some(status)) => {
            println!("{status}");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", failure_message(&e));
            ExitCode::FAILURE
        }
    }
}

/// Stderr line for a failed run. A missing project directory is reported as
/// a warning; everything else as a save error.
fn failure_message(err: &anyhow::Error) -> String {
    if err.is::<MissingProjectDir>() {
        format!("Warning: {err}")
    } else {
        format!("Error saving todos: {err:#}")
    }
}

fn init_tracing() {
    let debug = std::env::var("DEBUG").is_ok_and(|v| !v.is_empty());
    let default_level = if debug { "debug" } else { "warn" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Processes one hook event, returning the status line to print for a saved
/// task or `None` when the event was ignored.
async fn run<R: Read>(
    stdin: R,
    project_dir: Option<&str>,
    config: &StorageConfig,
) -> anyhow::Result<Option<String>> {
    let Some(input) = hook::read_hook_input(stdin)? else {
        return Ok(None);
    };

    let project_dir = project_dir.map(str::trim).unwrap_or_default();
    if project_dir.is_empty() {
        return Err(MissingProjectDir.into());
    }

    let entry = hook::build_log_entry(&input);
    let backend = open_backend(config, Path::new(project_dir))
        .await
        .context("failed to open storage backend")?;

    backend
        .append_entry(&entry)
        .await
        .context("failed to append log entry")?;

    tracing::debug!(
        tool = %input.tool_name,
        backend = %backend.backend_kind(),
        "saved task event"
    );

    Ok(Some(format!(
        "Saved {} task ({} backend)",
        input.tool_name,
        backend.backend_kind()
    )))
}

#[cfg(test)]
mod tests {
    use log_store::{JsonBackend, QueryableStorageBackend, SqliteBackend, StorageBackend};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn event(tool: &str, tool_input: serde_json::Value) -> String {
        json!({
            "tool_name": tool,
            "tool_input": tool_input,
            "session_id": "s1",
            "cwd": "/work"
        })
        .to_string()
    }

    fn project(dir: &TempDir) -> Option<&str> {
        dir.path().to_str()
    }

    #[tokio::test]
    async fn test_saves_task_create_to_default_json() {
        let dir = TempDir::new().unwrap();
        let input = event("TaskCreate", json!({"subject": "Write tests"}));

        let status = run(input.as_bytes(), project(&dir), &StorageConfig::default())
            .await
            .unwrap();
        assert_eq!(status.as_deref(), Some("Saved TaskCreate task (json backend)"));

        let history = JsonBackend::new(dir.path().join(".claude/todos.json"))
            .load_history()
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].task.subject, "Write tests");
        assert_eq!(history[0].task.status, "pending");
        assert_eq!(history[0].session_id, "s1");
    }

    #[tokio::test]
    async fn test_saves_task_update_to_sqlite() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig {
            backend: "SQLite".to_string(),
            ..Default::default()
        };
        let input = event("TaskUpdate", json!({"taskId": "1", "status": "completed"}));

        let status = run(input.as_bytes(), project(&dir), &config).await.unwrap();
        assert_eq!(status.as_deref(), Some("Saved TaskUpdate task (sqlite backend)"));

        let backend = SqliteBackend::open(dir.path().join(".claude/todos.db"))
            .await
            .unwrap();
        let tasks = backend.get_tasks_by_status("completed").await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_ignores_non_task_event() {
        let dir = TempDir::new().unwrap();
        let input = event("Bash", json!({"command": "ls"}));

        let status = run(input.as_bytes(), project(&dir), &StorageConfig::default())
            .await
            .unwrap();
        assert_eq!(status, None);
        assert!(!dir.path().join(".claude").exists());
    }

    #[tokio::test]
    async fn test_non_task_event_without_project_dir_is_ok() {
        let input = event("Read", json!({}));
        let status = run(input.as_bytes(), None, &StorageConfig::default())
            .await
            .unwrap();
        assert_eq!(status, None);
    }

    #[tokio::test]
    async fn test_requires_project_dir() {
        let input = event("TaskCreate", json!({"subject": "x"}));
        for project_dir in [None, Some(""), Some("   ")] {
            let err = run(input.as_bytes(), project_dir, &StorageConfig::default())
                .await
                .unwrap_err();
            assert!(err.is::<MissingProjectDir>());
            assert_eq!(failure_message(&err), "Warning: CLAUDE_PROJECT_DIR not set");
        }
    }

    #[tokio::test]
    async fn test_storage_failure_message_has_error_prefix() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig {
            backend: "postgres".to_string(),
            ..Default::default()
        };
        let input = event("TaskCreate", json!({"subject": "x"}));

        let err = run(input.as_bytes(), project(&dir), &config)
            .await
            .unwrap_err();
        let message = failure_message(&err);
        assert!(message.starts_with("Error saving todos: "), "{message}");
        assert!(message.contains("TODO_POSTGRES_URL"), "{message}");
    }

    #[tokio::test]
    async fn test_malformed_input_is_error() {
        let dir = TempDir::new().unwrap();
        let err = run(&b"{not json"[..], project(&dir), &StorageConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to decode hook input"));
    }

    #[tokio::test]
    async fn test_escaping_log_path_is_error() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig {
            log_path: Some("../../etc/passwd".to_string()),
            ..Default::default()
        };
        let input = event("TaskCreate", json!({"subject": "x"}));

        let err = run(input.as_bytes(), project(&dir), &config)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("TODO_LOG_PATH"));
    }

    #[tokio::test]
    async fn test_unknown_backend_is_error() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig {
            backend: "cassandra".to_string(),
            ..Default::default()
        };
        let input = event("TaskCreate", json!({"subject": "x"}));

        let err = run(input.as_bytes(), project(&dir), &config)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("cassandra"));
    }
}
