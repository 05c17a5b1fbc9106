//! PostgreSQL storage backend.

use async_trait::async_trait;
use entities::{LogEntry, TaskItem};
use sqlx::{Connection, PgConnection};

use crate::{
    codec, BackendKind, QueryableStorageBackend, StorageBackend, StorageError, StorageResult,
};

const EMPTY_LIST: &str = "[]";
const EMPTY_MAP: &str = "{}";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS log_entries (
        id BIGSERIAL PRIMARY KEY,
        timestamp TEXT NOT NULL,
        session_id TEXT NOT NULL,
        cwd TEXT NOT NULL,
        tool_name TEXT NOT NULL DEFAULT '',
        task_id TEXT NOT NULL DEFAULT '',
        subject TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT '',
        active_form TEXT NOT NULL DEFAULT '',
        owner TEXT NOT NULL DEFAULT '',
        blocks JSONB NOT NULL DEFAULT '[]'::jsonb,
        blocked_by JSONB NOT NULL DEFAULT '[]'::jsonb,
        metadata JSONB NOT NULL DEFAULT '{}'::jsonb
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_entries_session ON log_entries(session_id)",
    "CREATE INDEX IF NOT EXISTS idx_entries_status ON log_entries(status)",
];

const SELECT_ENTRIES: &str = r#"
    SELECT timestamp, session_id, cwd, tool_name, task_id, subject, description,
           status, active_form, owner,
           blocks::text AS blocks, blocked_by::text AS blocked_by, metadata::text AS metadata
    FROM log_entries
"#;

/// Stores entries in a single denormalized PostgreSQL table.
///
/// Optional task fields are stored as empty strings, empty JSON arrays and
/// empty JSON objects, and read back as `None`. An entry whose task had
/// `blocks: Some(vec![])` therefore comes back with `blocks: None`, and a
/// `description: Some("")` comes back as `None`.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    connection_string: String,
}

impl PostgresBackend {
    /// Connects once to create the table and indexes if they are missing.
    pub async fn open(connection_string: impl Into<String>) -> StorageResult<Self> {
        let backend = Self {
            connection_string: connection_string.into(),
        };

        let mut conn = backend.connect().await?;
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&mut conn)
                .await
                .map_err(StorageError::database("create schema"))?;
        }
        close(conn).await?;

        tracing::debug!("opened postgres log store");
        Ok(backend)
    }

    async fn connect(&self) -> StorageResult<PgConnection> {
        PgConnection::connect(&self.connection_string)
            .await
            .map_err(StorageError::database("connect to postgres"))
    }

    async fn fetch_entries(&self, session_id: Option<&str>) -> StorageResult<Vec<LogEntry>> {
        let mut conn = self.connect().await?;

        let rows: Vec<EntryRow> = match session_id {
            Some(session_id) => {
                let sql = format!("{SELECT_ENTRIES} WHERE session_id = $1 ORDER BY id");
                sqlx::query_as(&sql)
                    .bind(session_id)
                    .fetch_all(&mut conn)
                    .await
                    .map_err(StorageError::database("query entries by session"))?
            }
            None => {
                let sql = format!("{SELECT_ENTRIES} ORDER BY id");
                sqlx::query_as(&sql)
                    .fetch_all(&mut conn)
                    .await
                    .map_err(StorageError::database("query history"))?
            }
        };
        close(conn).await?;

        rows.into_iter().map(EntryRow::into_entry).collect()
    }
}

#[async_trait]
impl StorageBackend for PostgresBackend {
    async fn load_history(&self) -> StorageResult<Vec<LogEntry>> {
        self.fetch_entries(None).await
    }

    async fn append_entry(&self, entry: &LogEntry) -> StorageResult<()> {
        let task = &entry.task;
        let blocks = codec::encode_or_empty(&task.blocks, EMPTY_LIST)?;
        let blocked_by = codec::encode_or_empty(&task.blocked_by, EMPTY_LIST)?;
        let metadata = codec::encode_or_empty(&task.metadata, EMPTY_MAP)?;

        let mut conn = self.connect().await?;
        sqlx::query(
            r#"
            INSERT INTO log_entries (timestamp, session_id, cwd, tool_name, task_id, subject,
                                     description, status, active_form, owner,
                                     blocks, blocked_by, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11::jsonb, $12::jsonb, $13::jsonb)
            "#,
        )
        .bind(&entry.timestamp)
        .bind(&entry.session_id)
        .bind(&entry.cwd)
        .bind(&entry.tool_name)
        .bind(task.id.as_deref().unwrap_or_default())
        .bind(&task.subject)
        .bind(task.description.as_deref().unwrap_or_default())
        .bind(&task.status)
        .bind(&task.active_form)
        .bind(task.owner.as_deref().unwrap_or_default())
        .bind(&blocks)
        .bind(&blocked_by)
        .bind(&metadata)
        .execute(&mut conn)
        .await
        .map_err(StorageError::database("insert log entry"))?;
        close(conn).await?;

        tracing::debug!(session_id = %entry.session_id, tool = %entry.tool_name, "appended log entry");
        Ok(())
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    fn as_queryable(&self) -> Option<&dyn QueryableStorageBackend> {
        Some(self)
    }
}

#[async_trait]
impl QueryableStorageBackend for PostgresBackend {
    async fn get_entries_by_session(&self, session_id: &str) -> StorageResult<Vec<LogEntry>> {
        self.fetch_entries(Some(session_id)).await
    }

    async fn get_tasks_by_status(&self, status: &str) -> StorageResult<Vec<TaskItem>> {
        let mut conn = self.connect().await?;
        let sql = format!("{SELECT_ENTRIES} WHERE status = $1 ORDER BY id");
        let rows: Vec<EntryRow> = sqlx::query_as(&sql)
            .bind(status)
            .fetch_all(&mut conn)
            .await
            .map_err(StorageError::database("query tasks by status"))?;
        close(conn).await?;

        rows.into_iter()
            .map(|row| row.into_entry().map(|entry| entry.task))
            .collect()
    }
}

async fn close(conn: PgConnection) -> StorageResult<()> {
    conn.close()
        .await
        .map_err(StorageError::database("close connection"))
}

#[derive(Debug, Default, sqlx::FromRow)]
struct EntryRow {
    timestamp: String,
    session_id: String,
    cwd: String,
    tool_name: String,
    task_id: String,
    subject: String,
    description: String,
    status: String,
    active_form: String,
    owner: String,
    blocks: Option<String>,
    blocked_by: Option<String>,
    metadata: Option<String>,
}

impl EntryRow {
    fn into_entry(self) -> StorageResult<LogEntry> {
        Ok(LogEntry {
            timestamp: self.timestamp,
            session_id: self.session_id,
            cwd: self.cwd,
            tool_name: self.tool_name,
            task: TaskItem {
                id: non_empty(self.task_id),
                subject: self.subject,
                description: non_empty(self.description),
                status: self.status,
                active_form: self.active_form,
                owner: non_empty(self.owner),
                blocks: codec::decode_collapsed(self.blocks.as_deref(), EMPTY_LIST)?,
                blocked_by: codec::decode_collapsed(self.blocked_by.as_deref(), EMPTY_LIST)?,
                metadata: codec::decode_collapsed(self.metadata.as_deref(), EMPTY_MAP)?,
            },
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}
