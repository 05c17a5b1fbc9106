//! Backend selection

use std::path::{Path, PathBuf};

use path_guard::resolve_safe_path;

use crate::{
    config::non_blank, BackendKind, JsonBackend, PostgresBackend, SqliteBackend, StorageBackend,
    StorageConfig, StorageError, StorageResult, ENV_LOG_PATH, ENV_POSTGRES_URL, ENV_SQLITE_PATH,
};

/// Directory under the project holding the default log files
pub const DEFAULT_LOG_DIR: &str = ".claude";
/// Default JSON log file name
pub const DEFAULT_JSON_FILE: &str = "todos.json";
/// Default SQLite database file name
pub const DEFAULT_SQLITE_FILE: &str = "todos.db";

/// Builds the backend selected by `config`, with file paths confined to
/// `project_dir`.
pub async fn open_backend(
    config: &StorageConfig,
    project_dir: &Path,
) -> StorageResult<Box<dyn StorageBackend>> {
    let kind = config.backend_kind()?;

    let backend: Box<dyn StorageBackend> = match kind {
        BackendKind::Json => {
            let path = resolve_file(
                project_dir,
                config.log_path.as_deref(),
                ENV_LOG_PATH,
                DEFAULT_JSON_FILE,
            )?;
            Box::new(JsonBackend::new(path))
        }
        BackendKind::Sqlite => {
            let path = resolve_file(
                project_dir,
                config.sqlite_path.as_deref(),
                ENV_SQLITE_PATH,
                DEFAULT_SQLITE_FILE,
            )?;
            Box::new(SqliteBackend::open(path).await?)
        }
        BackendKind::Postgres => {
            let url = non_blank(config.postgres_url.as_deref()).ok_or(
                StorageError::MissingConnectionString {
                    kind,
                    setting: ENV_POSTGRES_URL,
                },
            )?;
            Box::new(PostgresBackend::open(url).await?)
        }
    };

    tracing::debug!(backend = %kind, "storage backend ready");
    Ok(backend)
}

fn resolve_file(
    project_dir: &Path,
    custom: Option<&str>,
    setting: &'static str,
    default_name: &str,
) -> StorageResult<PathBuf> {
    match non_blank(custom) {
        Some(custom) => resolve_safe_path(project_dir, custom)
            .map_err(|source| StorageError::InvalidPath { setting, source }),
        None => Ok(project_dir.join(DEFAULT_LOG_DIR).join(default_name)),
    }
}
