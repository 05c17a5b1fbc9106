//! SQLite storage backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use entities::{LogEntry, TaskItem};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
    Connection, SqliteConnection,
};

use crate::{
    codec, BackendKind, QueryableStorageBackend, StorageBackend, StorageError, StorageResult,
};

/// Schema statements, each safe to run against an existing database.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS log_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        session_id TEXT NOT NULL,
        cwd TEXT NOT NULL,
        tool_name TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entry_id INTEGER NOT NULL,
        task_id TEXT,
        subject TEXT NOT NULL,
        description TEXT,
        status TEXT NOT NULL,
        active_form TEXT NOT NULL,
        owner TEXT,
        blocks TEXT,
        blocked_by TEXT,
        metadata TEXT,
        FOREIGN KEY (entry_id) REFERENCES log_entries(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_entries_session ON log_entries(session_id)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_entry ON tasks(entry_id)",
];

const SELECT_ENTRIES: &str = r#"
    SELECT e.id AS entry_id, e.timestamp, e.session_id, e.cwd, e.tool_name,
           t.task_id, t.subject, t.description, t.status, t.active_form, t.owner,
           t.blocks, t.blocked_by, t.metadata
    FROM log_entries e
    LEFT JOIN tasks t ON t.entry_id = e.id
"#;

/// Stores entries in a local SQLite file: one `log_entries` row per entry and
/// one `tasks` row referencing it.
///
/// Every call opens its own connection with WAL journaling and foreign keys
/// enabled, and closes it before returning. Appends run in a transaction, so
/// an entry is never stored without its task.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    db_path: PathBuf,
}

impl SqliteBackend {
    /// Opens (creating if needed) the database at `db_path` and ensures the
    /// schema exists. Safe to call repeatedly against the same file.
    pub async fn open(db_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let backend = Self {
            db_path: db_path.into(),
        };
        backend.ensure_schema().await?;
        tracing::debug!(path = %backend.db_path.display(), "opened sqlite log store");
        Ok(backend)
    }

    /// Path of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn connect(&self) -> StorageResult<SqliteConnection> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&self.db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        SqliteConnection::connect_with(&options)
            .await
            .map_err(StorageError::database("open database"))
    }

    async fn ensure_schema(&self) -> StorageResult<()> {
        let mut conn = self.connect().await?;
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&mut conn)
                .await
                .map_err(StorageError::database("create schema"))?;
        }
        close(conn).await
    }

    async fn fetch_entries(&self, session_id: Option<&str>) -> StorageResult<Vec<LogEntry>> {
        let mut conn = self.connect().await?;

        let rows: Vec<JoinedRow> = match session_id {
            Some(session_id) => {
                let sql = format!("{SELECT_ENTRIES} WHERE e.session_id = ? ORDER BY e.id, t.id");
                sqlx::query_as(&sql)
                    .bind(session_id)
                    .fetch_all(&mut conn)
                    .await
                    .map_err(StorageError::database("query entries by session"))?
            }
            None => {
                let sql = format!("{SELECT_ENTRIES} ORDER BY e.id, t.id");
                sqlx::query_as(&sql)
                    .fetch_all(&mut conn)
                    .await
                    .map_err(StorageError::database("query history"))?
            }
        };
        close(conn).await?;

        group_rows(rows)
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn load_history(&self) -> StorageResult<Vec<LogEntry>> {
        self.fetch_entries(None).await
    }

    async fn append_entry(&self, entry: &LogEntry) -> StorageResult<()> {
        // Encode before touching the database so a bad entry never opens a
        // transaction.
        let task = &entry.task;
        let blocks = codec::encode_optional(&task.blocks)?;
        let blocked_by = codec::encode_optional(&task.blocked_by)?;
        let metadata = codec::encode_optional(&task.metadata)?;

        let mut conn = self.connect().await?;
        let mut tx = conn
            .begin()
            .await
            .map_err(StorageError::database("begin transaction"))?;

        let inserted = async {
            let entry_id = sqlx::query(
                r#"
                INSERT INTO log_entries (timestamp, session_id, cwd, tool_name)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&entry.timestamp)
            .bind(&entry.session_id)
            .bind(&entry.cwd)
            .bind(&entry.tool_name)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::database("insert log entry"))?
            .last_insert_rowid();

            sqlx::query(
                r#"
                INSERT INTO tasks (entry_id, task_id, subject, description, status,
                                   active_form, owner, blocks, blocked_by, metadata)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(entry_id)
            .bind(&task.id)
            .bind(&task.subject)
            .bind(&task.description)
            .bind(&task.status)
            .bind(&task.active_form)
            .bind(&task.owner)
            .bind(&blocks)
            .bind(&blocked_by)
            .bind(&metadata)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::database("insert task"))?;

            Ok::<_, StorageError>(entry_id)
        }
        .await;

        let entry_id = match inserted {
            Ok(entry_id) => entry_id,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "failed to roll back log entry insert");
                }
                return Err(e);
            }
        };

        tx.commit()
            .await
            .map_err(StorageError::database("commit transaction"))?;
        close(conn).await?;

        tracing::debug!(
            path = %self.db_path.display(),
            entry_id,
            session_id = %entry.session_id,
            "appended log entry"
        );
        Ok(())
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn as_queryable(&self) -> Option<&dyn QueryableStorageBackend> {
        Some(self)
    }
}

#[async_trait]
impl QueryableStorageBackend for SqliteBackend {
    async fn get_entries_by_session(&self, session_id: &str) -> StorageResult<Vec<LogEntry>> {
        self.fetch_entries(Some(session_id)).await
    }

    async fn get_tasks_by_status(&self, status: &str) -> StorageResult<Vec<TaskItem>> {
        let mut conn = self.connect().await?;
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"
            SELECT task_id, subject, description, status, active_form, owner,
                   blocks, blocked_by, metadata
            FROM tasks
            WHERE status = ?
            ORDER BY id
            "#,
        )
        .bind(status)
        .fetch_all(&mut conn)
        .await
        .map_err(StorageError::database("query tasks by status"))?;
        close(conn).await?;

        rows.into_iter().map(TaskRow::into_task).collect()
    }
}

async fn close(conn: SqliteConnection) -> StorageResult<()> {
    conn.close()
        .await
        .map_err(StorageError::database("close database"))
}

/// One row of the entries/tasks outer join. Task columns are NULL when the
/// entry has no task row.
#[derive(Debug, sqlx::FromRow)]
struct JoinedRow {
    entry_id: i64,
    timestamp: String,
    session_id: String,
    cwd: String,
    tool_name: String,
    task_id: Option<String>,
    subject: Option<String>,
    description: Option<String>,
    status: Option<String>,
    active_form: Option<String>,
    owner: Option<String>,
    blocks: Option<String>,
    blocked_by: Option<String>,
    metadata: Option<String>,
}

impl JoinedRow {
    /// Splits the row into the entry and, if the join matched, its task.
    fn into_parts(self) -> StorageResult<(i64, LogEntry, Option<TaskItem>)> {
        let task = match (self.subject, self.status, self.active_form) {
            (Some(subject), Some(status), Some(active_form)) => Some(
                TaskRow {
                    task_id: self.task_id,
                    subject,
                    description: self.description,
                    status,
                    active_form,
                    owner: self.owner,
                    blocks: self.blocks,
                    blocked_by: self.blocked_by,
                    metadata: self.metadata,
                }
                .into_task()?,
            ),
            _ => None,
        };

        let entry = LogEntry {
            timestamp: self.timestamp,
            session_id: self.session_id,
            cwd: self.cwd,
            tool_name: self.tool_name,
            task: TaskItem::default(),
        };
        Ok((self.entry_id, entry, task))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    task_id: Option<String>,
    subject: String,
    description: Option<String>,
    status: String,
    active_form: String,
    owner: Option<String>,
    blocks: Option<String>,
    blocked_by: Option<String>,
    metadata: Option<String>,
}

impl TaskRow {
    fn into_task(self) -> StorageResult<TaskItem> {
        Ok(TaskItem {
            id: self.task_id,
            subject: self.subject,
            description: self.description,
            status: self.status,
            active_form: self.active_form,
            owner: self.owner,
            blocks: codec::decode_optional(self.blocks.as_deref())?,
            blocked_by: codec::decode_optional(self.blocked_by.as_deref())?,
            metadata: codec::decode_optional(self.metadata.as_deref())?,
        })
    }
}

/// Folds join rows (ordered by entry id, then task id) into one entry per
/// parent row, in first-seen order. An entry without a task row keeps the
/// default task; extra task rows beyond the first are ignored.
fn group_rows(rows: Vec<JoinedRow>) -> StorageResult<Vec<LogEntry>> {
    let mut entries: Vec<(i64, LogEntry, bool)> = Vec::new();

    for row in rows {
        let (entry_id, entry, task) = row.into_parts()?;

        match entries.last_mut() {
            Some((last_id, last, has_task)) if *last_id == entry_id => {
                if let Some(task) = task {
                    if *has_task {
                        tracing::debug!(entry_id, "ignoring extra task row for log entry");
                    } else {
                        last.task = task;
                        *has_task = true;
                    }
                }
            }
            _ => {
                let mut entry = entry;
                let has_task = task.is_some();
                if let Some(task) = task {
                    entry.task = task;
                }
                entries.push((entry_id, entry, has_task));
            }
        }
    }

    Ok(entries.into_iter().map(|(_, entry, _)| entry).collect())
}
