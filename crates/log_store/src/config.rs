//! Storage configuration

use serde::{Deserialize, Serialize};

use crate::{BackendKind, StorageResult};

/// Environment variable selecting the backend kind
pub const ENV_BACKEND: &str = "TODO_STORAGE_BACKEND";
/// Environment variable overriding the JSON log path
pub const ENV_LOG_PATH: &str = "TODO_LOG_PATH";
/// Environment variable overriding the SQLite database path
pub const ENV_SQLITE_PATH: &str = "TODO_SQLITE_PATH";
/// Environment variable holding the PostgreSQL connection string
pub const ENV_POSTGRES_URL: &str = "TODO_POSTGRES_URL";

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend kind ("json", "sqlite" or "postgres")
    #[serde(default = "default_backend")]
    pub backend: String,

    /// JSON log file, relative to the project directory unless absolute
    #[serde(default)]
    pub log_path: Option<String>,

    /// SQLite database file, relative to the project directory unless absolute
    #[serde(default)]
    pub sqlite_path: Option<String>,

    /// PostgreSQL connection string
    #[serde(default)]
    pub postgres_url: Option<String>,
}

fn default_backend() -> String {
    BackendKind::default().as_str().to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            log_path: None,
            sqlite_path: None,
            postgres_url: None,
        }
    }
}

impl StorageConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from defaults overridden by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(backend) = lookup(ENV_BACKEND) {
            config.backend = backend;
        }

        if let Some(path) = lookup(ENV_LOG_PATH) {
            config.log_path = Some(path);
        }

        if let Some(path) = lookup(ENV_SQLITE_PATH) {
            config.sqlite_path = Some(path);
        }

        if let Some(url) = lookup(ENV_POSTGRES_URL) {
            config.postgres_url = Some(url);
        }

        config
    }

    /// Parses the configured backend kind.
    pub fn backend_kind(&self) -> StorageResult<BackendKind> {
        self.backend.parse()
    }
}

/// Trims a configured value, treating blank as unset.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::StorageError;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.backend, "json");
        assert_eq!(config.log_path, None);
        assert_eq!(config.sqlite_path, None);
        assert_eq!(config.postgres_url, None);
        assert_eq!(config.backend_kind().unwrap(), BackendKind::Json);
    }

    #[test]
    fn test_from_lookup_empty_environment() {
        let config = StorageConfig::from_lookup(|_| None);
        assert_eq!(config, StorageConfig::default());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = StorageConfig::from_lookup(lookup_from(&[
            (ENV_BACKEND, " SQLite "),
            (ENV_LOG_PATH, "logs/todos.json"),
            (ENV_SQLITE_PATH, "data/todos.db"),
            (ENV_POSTGRES_URL, "postgres://localhost/todos"),
        ]));

        assert_eq!(config.backend_kind().unwrap(), BackendKind::Sqlite);
        assert_eq!(config.log_path.as_deref(), Some("logs/todos.json"));
        assert_eq!(config.sqlite_path.as_deref(), Some("data/todos.db"));
        assert_eq!(
            config.postgres_url.as_deref(),
            Some("postgres://localhost/todos")
        );
    }

    #[test]
    fn test_blank_backend_selects_default() {
        let config = StorageConfig::from_lookup(lookup_from(&[(ENV_BACKEND, "   ")]));
        assert_eq!(config.backend_kind().unwrap(), BackendKind::Json);
    }

    #[test]
    fn test_unknown_backend() {
        let config = StorageConfig::from_lookup(lookup_from(&[(ENV_BACKEND, "redis")]));
        assert!(matches!(
            config.backend_kind(),
            Err(StorageError::UnknownBackend { value }) if value == "redis"
        ));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: StorageConfig =
            serde_json::from_str(r#"{"sqlite_path": "x.db"}"#).unwrap();
        assert_eq!(config.backend, "json");
        assert_eq!(config.sqlite_path.as_deref(), Some("x.db"));
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(Some(" a/B.json ")), Some("a/B.json"));
    }
}
