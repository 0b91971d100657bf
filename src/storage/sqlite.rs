//! SQLite page storage
//!
//! Each task gets `<root>/sqlite/<task-id>.db`. Exports are written to
//! `<root>/exports/<task-id>-details.jsonl` and `<task-id>-html.jsonl`.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{PageDataStorage, PageDataStore, StorageError, StorageResult};
use crate::storage::PageRecord;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Opens one SQLite database per task under a storage root
#[derive(Debug, Clone)]
pub struct SqlitePageStorage {
    root: PathBuf,
}

impl SqlitePageStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn database_path(&self, task_id: &str) -> PathBuf {
        self.root.join("sqlite").join(format!("{}.db", task_id))
    }

    pub fn export_dir(&self) -> PathBuf {
        self.root.join("exports")
    }
}

#[async_trait]
impl PageDataStorage for SqlitePageStorage {
    async fn open(&self, task_id: &str) -> StorageResult<Arc<dyn PageDataStore>> {
        let path = self.database_path(task_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = SqlitePageStore::open(task_id, &path, self.export_dir())?;
        debug!(task_id, path = %path.display(), "Opened page store");
        Ok(Arc::new(store))
    }
}

/// One task's SQLite database
pub struct SqlitePageStore {
    task_id: String,
    export_dir: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl SqlitePageStore {
    pub fn open(task_id: &str, path: &Path, export_dir: PathBuf) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self {
            task_id: task_id.to_string(),
            export_dir,
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory(task_id: &str, export_dir: PathBuf) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            task_id: task_id.to_string(),
            export_dir,
            conn: Mutex::new(Some(conn)),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Database(format!("connection lock poisoned: {}", e)))
    }

    /// Number of stored pages
    pub fn count(&self) -> StorageResult<u64> {
        let guard = self.lock()?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| StorageError::Closed(self.task_id.clone()))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM details", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn insert(conn: &mut Connection, record: &PageRecord) -> StorageResult<()> {
        let hash = record.html_hash();
        let now = Utc::now().to_rfc3339();

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO html (html_hash, normalized_html, created_at) VALUES (?1, ?2, ?3)",
            params![hash, record.html.normalized_html, now],
        )
        .map_err(|e| map_constraint(e, &hash))?;
        tx.execute(
            "INSERT INTO details (
                html_hash, tx_id, data_id, arns_name, wayfinder_url, gateway_url,
                charset, language, title, description,
                headers, open_graph, absolute_urls, relative_urls, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                hash,
                record.tx_id,
                record.data_id,
                record.arns_name,
                record.wayfinder_url,
                record.gateway_url,
                record.html.charset,
                record.html.language,
                record.html.title,
                record.html.description,
                serde_json::to_string(&record.headers)?,
                serde_json::to_string(&record.html.open_graph)?,
                serde_json::to_string(&record.absolute_urls)?,
                serde_json::to_string(&record.relative_urls)?,
                now,
            ],
        )
        .map_err(|e| map_constraint(e, &hash))?;
        tx.commit()?;

        Ok(())
    }

    fn write_exports(&self, conn: &Connection) -> StorageResult<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.export_dir)?;

        let details_path = self
            .export_dir
            .join(format!("{}-details.jsonl", self.task_id));
        let html_path = self.export_dir.join(format!("{}-html.jsonl", self.task_id));

        let mut details_out = BufWriter::new(File::create(&details_path)?);
        let mut stmt = conn.prepare(
            "SELECT html_hash, tx_id, data_id, arns_name, wayfinder_url, gateway_url,
                    charset, language, title, description,
                    headers, open_graph, absolute_urls, relative_urls, created_at
             FROM details ORDER BY created_at, html_hash",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DetailsRow {
                html_hash: row.get(0)?,
                tx_id: row.get(1)?,
                data_id: row.get(2)?,
                arns_name: row.get(3)?,
                wayfinder_url: row.get(4)?,
                gateway_url: row.get(5)?,
                charset: row.get(6)?,
                language: row.get(7)?,
                title: row.get(8)?,
                description: row.get(9)?,
                headers: row.get(10)?,
                open_graph: row.get(11)?,
                absolute_urls: row.get(12)?,
                relative_urls: row.get(13)?,
                created_at: row.get(14)?,
            })
        })?;
        for row in rows {
            let line = row?.into_json()?;
            serde_json::to_writer(&mut details_out, &line)?;
            details_out.write_all(b"\n")?;
        }
        details_out.flush()?;

        let mut html_out = BufWriter::new(File::create(&html_path)?);
        let mut stmt = conn.prepare(
            "SELECT html_hash, normalized_html, created_at FROM html ORDER BY created_at, html_hash",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(HtmlRow {
                html_hash: row.get(0)?,
                normalized_html: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        for row in rows {
            serde_json::to_writer(&mut html_out, &row?)?;
            html_out.write_all(b"\n")?;
        }
        html_out.flush()?;

        Ok(vec![details_path, html_path])
    }
}

#[async_trait]
impl PageDataStore for SqlitePageStore {
    async fn save(&self, record: &PageRecord) -> StorageResult<()> {
        let mut guard = self.lock()?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| StorageError::Closed(self.task_id.clone()))?;
        Self::insert(conn, record)
    }

    async fn export(&self) -> StorageResult<Vec<PathBuf>> {
        let guard = self.lock()?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| StorageError::Closed(self.task_id.clone()))?;

        let paths = self.write_exports(conn)?;
        info!(task_id = %self.task_id, files = paths.len(), "Exported page store");
        Ok(paths)
    }

    async fn close(&self) -> StorageResult<()> {
        let conn = self
            .lock()?
            .take()
            .ok_or_else(|| StorageError::Closed(self.task_id.clone()))?;

        conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
        debug!(task_id = %self.task_id, "Closed page store");
        Ok(())
    }
}

fn map_constraint(error: rusqlite::Error, key: &str) -> StorageError {
    match &error {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StorageError::DuplicateKey(key.to_string())
        }
        _ => StorageError::Sqlite(error),
    }
}

struct DetailsRow {
    html_hash: String,
    tx_id: Option<String>,
    data_id: Option<String>,
    arns_name: String,
    wayfinder_url: String,
    gateway_url: String,
    charset: String,
    language: String,
    title: String,
    description: String,
    headers: String,
    open_graph: String,
    absolute_urls: String,
    relative_urls: String,
    created_at: String,
}

impl DetailsRow {
    fn into_json(self) -> StorageResult<serde_json::Value> {
        Ok(serde_json::json!({
            "htmlHash": self.html_hash,
            "txId": self.tx_id,
            "dataId": self.data_id,
            "arnsName": self.arns_name,
            "wayfinderUrl": self.wayfinder_url,
            "gatewayUrl": self.gateway_url,
            "charset": self.charset,
            "language": self.language,
            "title": self.title,
            "description": self.description,
            "headers": serde_json::from_str::<serde_json::Value>(&self.headers)?,
            "openGraph": serde_json::from_str::<serde_json::Value>(&self.open_graph)?,
            "absoluteUrls": serde_json::from_str::<serde_json::Value>(&self.absolute_urls)?,
            "relativeUrls": serde_json::from_str::<serde_json::Value>(&self.relative_urls)?,
            "createdAt": self.created_at,
        }))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HtmlRow {
    html_hash: String,
    normalized_html: String,
    created_at: String,
}
