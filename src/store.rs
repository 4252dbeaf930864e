//! Persistence for subscribers, raw report rows and rendered summaries.
//!
//! Two traits split the storage concerns so callers only depend on what they
//! use: [`SubscriberStore`] for the subscriber list and [`ReportStore`] for
//! report archival. [`SqliteStore`] implements both on one SQLite file.

use crate::constants::{RAW_TABLE, SUMMARY_TABLE};
use crate::error::{BarnError, Result};
use crate::models::ReportTable;
use chrono::Utc;
use rusqlite::{Connection, params, params_from_iter};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Append-only set of subscriber chat ids
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait SubscriberStore: Send + Sync {
    /// Record a subscriber; returns false when it was already known
    fn add_subscriber(&self, chat_id: i64) -> Result<bool>;

    /// Snapshot of all subscribers in registration order
    fn subscribers(&self) -> Result<Vec<i64>>;
}

/// Archive of processed reports
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait ReportStore: Send + Sync {
    /// Replace the raw table with the flattened report
    fn replace_raw_table(&self, table: &ReportTable) -> Result<()>;

    /// Append rendered message chunks
    fn append_summaries(&self, chunks: &[String]) -> Result<()>;
}

/// SQLite-backed store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| {
            BarnError::storage(format!("Failed to open database {}", path.display()), e)
        })?;
        debug!("Opened database: {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| BarnError::storage("Failed to open in-memory database", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS subscribers (chat_id INTEGER PRIMARY KEY);
             CREATE TABLE IF NOT EXISTS {SUMMARY_TABLE} (
                 summary TEXT NOT NULL,
                 created_at TEXT NOT NULL
             );"
        ))
        .map_err(|e| BarnError::storage("Failed to initialise schema", e))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave SQLite half-written
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of rows currently in the raw table
    pub fn raw_row_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()
            .query_row(&format!("SELECT COUNT(*) FROM {RAW_TABLE}"), [], |row| {
                row.get(0)
            })
            .map_err(|e| BarnError::storage("Failed to count raw rows", e))?;
        Ok(count as usize)
    }

    /// All stored summaries, oldest first
    pub fn summaries(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("SELECT summary FROM {SUMMARY_TABLE} ORDER BY rowid"))
            .map_err(|e| BarnError::storage("Failed to query summaries", e))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<std::result::Result<Vec<_>, _>>())
            .map_err(|e| BarnError::storage("Failed to read summaries", e))?;
        Ok(rows)
    }
}

impl SubscriberStore for SqliteStore {
    fn add_subscriber(&self, chat_id: i64) -> Result<bool> {
        let inserted = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO subscribers (chat_id) VALUES (?1)",
                params![chat_id],
            )
            .map_err(|e| BarnError::storage(format!("Failed to add subscriber {chat_id}"), e))?;
        Ok(inserted > 0)
    }

    fn subscribers(&self) -> Result<Vec<i64>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT chat_id FROM subscribers ORDER BY rowid")
            .map_err(|e| BarnError::storage("Failed to query subscribers", e))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))
            .and_then(|rows| rows.collect::<std::result::Result<Vec<_>, _>>())
            .map_err(|e| BarnError::storage("Failed to read subscribers", e))?;
        Ok(ids)
    }
}

impl ReportStore for SqliteStore {
    fn replace_raw_table(&self, table: &ReportTable) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| BarnError::storage("Failed to begin transaction", e))?;

        tx.execute_batch(&format!("DROP TABLE IF EXISTS {RAW_TABLE}"))
            .map_err(|e| BarnError::storage("Failed to drop raw table", e))?;

        let columns = sql_column_names(&table.columns);
        let definition = columns
            .iter()
            .map(|c| format!("{} TEXT", quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");
        tx.execute_batch(&format!("CREATE TABLE {RAW_TABLE} ({definition})"))
            .map_err(|e| BarnError::storage("Failed to create raw table", e))?;

        {
            let placeholders = vec!["?"; columns.len()].join(", ");
            let mut stmt = tx
                .prepare(&format!("INSERT INTO {RAW_TABLE} VALUES ({placeholders})"))
                .map_err(|e| BarnError::storage("Failed to prepare raw insert", e))?;
            for row in &table.rows {
                stmt.execute(params_from_iter(row.iter()))
                    .map_err(|e| BarnError::storage("Failed to insert raw row", e))?;
            }
        }

        tx.commit()
            .map_err(|e| BarnError::storage("Failed to commit raw table", e))?;
        info!(
            "Stored {} raw rows across {} columns",
            table.rows.len(),
            columns.len()
        );
        Ok(())
    }

    fn append_summaries(&self, chunks: &[String]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| BarnError::storage("Failed to begin transaction", e))?;
        let created_at = Utc::now().to_rfc3339();

        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO {SUMMARY_TABLE} (summary, created_at) VALUES (?1, ?2)"
                ))
                .map_err(|e| BarnError::storage("Failed to prepare summary insert", e))?;
            for chunk in chunks {
                stmt.execute(params![chunk, created_at])
                    .map_err(|e| BarnError::storage("Failed to insert summary", e))?;
            }
        }

        tx.commit()
            .map_err(|e| BarnError::storage("Failed to commit summaries", e))?;
        debug!("Appended {} summaries", chunks.len());
        Ok(())
    }
}

/// SQL-safe, unique column names for the raw table
///
/// Flat names may repeat or be empty; SQLite needs distinct identifiers, so
/// repeats get a numeric suffix and empty names are replaced by position.
fn sql_column_names(columns: &[String]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    columns
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let base = if name.trim().is_empty() {
                format!("column_{index}")
            } else {
                name.clone()
            };
            let count = seen.entry(base.to_lowercase()).or_insert(0);
            *count += 1;
            if *count == 1 {
                base
            } else {
                format!("{base}_{count}")
            }
        })
        .collect()
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
