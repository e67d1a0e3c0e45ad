//! Repository for analysis history

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::error::Result;
use crate::types::AnalysisRecord;

/// Database handle (single connection)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        super::schema::run_migrations(&self.conn())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one analysis, returning its row id
    pub fn append_analysis(&self, record: &AnalysisRecord) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            r#"
            INSERT INTO analyses (file_name, result, timestamp, session_id)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                record.file_name,
                record.result,
                record.timestamp.to_rfc3339(),
                record.session_id,
            ],
        )?;
        let id = conn.last_insert_rowid();

        tracing::debug!(id, file = %record.file_name, "Analysis appended to history");
        Ok(id)
    }

    /// Most recent analyses first
    pub fn list_analyses(&self, limit: usize) -> Result<Vec<AnalysisRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, file_name, result, timestamp, session_id
            FROM analyses
            ORDER BY timestamp DESC, id DESC
            LIMIT ?1
            "#,
        )?;

        let records = stmt
            .query_map([limit as i64], Self::row_to_analysis)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn count_analyses(&self) -> Result<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM analyses", [], |r| r.get(0))?;
        Ok(count)
    }

    fn row_to_analysis(row: &Row) -> rusqlite::Result<AnalysisRecord> {
        let timestamp_str: String = row.get("timestamp")?;

        Ok(AnalysisRecord {
            id: Some(row.get("id")?),
            file_name: row.get("file_name")?,
            result: row.get("result")?,
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            session_id: row.get("session_id")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(file_name: &str, at: DateTime<Utc>) -> AnalysisRecord {
        AnalysisRecord {
            id: None,
            file_name: file_name.to_string(),
            result: format!("report for {}", file_name),
            timestamp: at,
            session_id: format!("s-{}", file_name),
        }
    }

    #[test]
    fn test_append_and_list_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        let now = Utc::now();
        db.append_analysis(&record("old.mp4", now - Duration::hours(2)))
            .unwrap();
        let id = db.append_analysis(&record("new.jpg", now)).unwrap();

        let listed = db.list_analyses(10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, Some(id));
        assert_eq!(listed[0].file_name, "new.jpg");
        assert_eq!(listed[0].session_id, "s-new.jpg");
        assert_eq!(listed[1].file_name, "old.mp4");

        assert_eq!(db.list_analyses(1).unwrap().len(), 1);
        assert_eq!(db.count_analyses().unwrap(), 2);
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");
        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        assert_eq!(db.count_analyses().unwrap(), 0);
        assert!(path.exists());
    }
}
