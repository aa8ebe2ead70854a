//! SQLite-backed record store.
//!
//! Records live in a single `dynamic_queries` table. Timestamps are stored
//! as fixed-width RFC 3339 UTC strings so text ordering matches time order.
//!
//! There is one connection per store. Every operation takes it on the
//! blocking thread pool, so store calls never block the async runtime and
//! are serialized against each other.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task::spawn_blocking;
use tracing::debug;
use uuid::Uuid;

use super::{DynamicQuery, DynamicQueryStore, QueryStatus, StoreError, StoreResult};

/// Current schema version. Bump this when the table layout changes.
const SCHEMA_VERSION: i32 = 1;

const COLUMNS: &str = "id, name, prompt, query, response_id, status, created_at, updated_at";

/// SQLite-based DynamicQuery store.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the store database at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// Default location: `~/.dynq/dynq.db`.
    pub fn default_path() -> StoreResult<PathBuf> {
        let base = dirs::home_dir().ok_or(StoreError::NoDataDir)?;
        Ok(base.join(".dynq").join("dynq.db"))
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `op` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            op(&conn)
        })
        .await?
    }
}

fn init(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS dynamic_queries (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            prompt TEXT NOT NULL,
            query TEXT,
            response_id TEXT,
            status TEXT NOT NULL DEFAULT 'in_progress'
                CHECK (status IN ('in_progress', 'complete')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;

    let stored_version: Option<i32> = conn
        .query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| {
            let s: String = row.get(0)?;
            Ok(s.parse().unwrap_or(0))
        })
        .optional()?;

    if stored_version != Some(SCHEMA_VERSION) {
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('version', ?)",
            params![SCHEMA_VERSION.to_string()],
        )?;
    }

    Ok(())
}

/// Current time truncated to the precision the table stores.
fn now() -> DateTime<Utc> {
    let at = Utc::now();
    at.with_nanosecond(at.nanosecond() / 1_000 * 1_000)
        .unwrap_or(at)
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<DynamicQuery> {
    let id: String = row.get(0)?;
    let status: String = row.get(5)?;

    Ok(DynamicQuery {
        id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
        name: row.get(1)?,
        prompt: row.get(2)?,
        query: row.get(3)?,
        response_id: row.get(4)?,
        status: status.parse().map_err(|e: String| {
            conversion_error(5, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?,
        created_at: parse_timestamp(row, 6)?,
        updated_at: parse_timestamp(row, 7)?,
    })
}

fn fetch(conn: &Connection, id: Uuid) -> StoreResult<Option<DynamicQuery>> {
    let record = conn
        .query_row(
            &format!("SELECT {} FROM dynamic_queries WHERE id = ?", COLUMNS),
            params![id.to_string()],
            from_row,
        )
        .optional()?;
    Ok(record)
}

#[async_trait]
impl DynamicQueryStore for SqliteStore {
    async fn create(&self, name: &str, prompt: &str) -> StoreResult<DynamicQuery> {
        let now = now();
        let record = DynamicQuery {
            id: Uuid::new_v4(),
            name: name.to_string(),
            prompt: prompt.to_string(),
            query: None,
            response_id: None,
            status: QueryStatus::InProgress,
            created_at: now,
            updated_at: now,
        };

        let row = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO dynamic_queries (id, name, prompt, status, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    row.id.to_string(),
                    row.name,
                    row.prompt,
                    row.status.as_str(),
                    timestamp(now),
                    timestamp(now)
                ],
            )?;
            Ok(())
        })
        .await?;
        debug!(query_id = %record.id, "dynamic query stored");

        Ok(record)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<DynamicQuery>> {
        self.with_conn(move |conn| fetch(conn, id)).await
    }

    async fn list(&self) -> StoreResult<Vec<DynamicQuery>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM dynamic_queries ORDER BY created_at DESC",
                COLUMNS
            ))?;
            let records = stmt
                .query_map([], from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }

    async fn rename(&self, id: Uuid, name: &str) -> StoreResult<DynamicQuery> {
        let name = name.to_string();
        let record = self
            .with_conn(move |conn| {
                let rows = conn.execute(
                    "UPDATE dynamic_queries SET name = ?, updated_at = ? WHERE id = ?",
                    params![name, timestamp(now()), id.to_string()],
                )?;
                if rows == 0 {
                    return Err(StoreError::NotFound(id));
                }
                fetch(conn, id)?.ok_or(StoreError::NotFound(id))
            })
            .await?;
        debug!(query_id = %id, "dynamic query renamed");
        Ok(record)
    }

    async fn complete(
        &self,
        id: Uuid,
        query: &str,
        response_id: &str,
    ) -> StoreResult<DynamicQuery> {
        let query = query.to_string();
        let response = response_id.to_string();
        let record = self
            .with_conn(move |conn| {
                let rows = conn.execute(
                    "UPDATE dynamic_queries
                     SET query = ?, response_id = ?, status = ?, updated_at = ?
                     WHERE id = ?",
                    params![
                        query,
                        response,
                        QueryStatus::Complete.as_str(),
                        timestamp(now()),
                        id.to_string()
                    ],
                )?;
                if rows == 0 {
                    return Err(StoreError::NotFound(id));
                }
                fetch(conn, id)?.ok_or(StoreError::NotFound(id))
            })
            .await?;
        debug!(query_id = %id, response_id, "dynamic query marked complete");
        Ok(record)
    }
}
