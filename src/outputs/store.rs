//! SQLite persistence for extraction records.
//!
//! Records live in a single `articles` table keyed by `(url, phrase)`.
//! Writes use `INSERT OR REPLACE`, so re-applying the same records (or a later
//! extraction of the same article) never produces duplicate rows.

use rusqlite::{Connection, params};
use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument};

use crate::models::ExtractionRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Idempotent sink for extraction records.
pub trait ResultStore {
    /// Persist `records`, replacing any existing row with the same `(url, phrase)`.
    ///
    /// Returns the number of records written.
    fn upsert(&mut self, records: &[ExtractionRecord]) -> Result<usize, StoreError>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self::with_connection(conn)?;
        info!("Database ready");
        Ok(store)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS articles (
                url TEXT,
                title TEXT,
                phrase TEXT,
                mentions INTEGER,
                date_published TEXT,
                PRIMARY KEY (url, phrase)
            );
            ",
        )?;
        Ok(())
    }

    /// Total number of rows in `articles`.
    pub fn row_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl ResultStore for SqliteStore {
    #[instrument(level = "info", skip_all, fields(records = records.len()))]
    fn upsert(&mut self, records: &[ExtractionRecord]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO articles (url, title, phrase, mentions, date_published)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                let (url, phrase) = record.key();
                stmt.execute(params![url, record.title, phrase, record.mentions, record.date_published])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }
}

#[cfg(test)]
impl SqliteStore {
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    pub fn load_all(&self) -> Result<Vec<ExtractionRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT url, title, phrase, mentions, date_published FROM articles ORDER BY url, phrase",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ExtractionRecord {
                url: row.get(0)?,
                title: row.get(1)?,
                phrase: row.get(2)?,
                mentions: row.get(3)?,
                date_published: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
