//! SQLite-based session storage.
//!
//! Provides persistent storage for completed phases and the day-range
//! aggregate queries the statistics view needs.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::{data_dir, migrations, RecordStore};
use crate::error::StorageError;
use crate::session::SessionRecord;
use crate::timer::PhaseKind;

const SELECT_COLUMNS: &str =
    "SELECT id, phase_kind, duration_minutes, completed_at, linked_task_id FROM sessions";

/// SQLite database for session storage.
///
/// The connection sits behind a mutex so the store can be shared with the
/// record writer's blocking tasks.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open the database at `~/.config/pomodoro/pomodoro.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StorageError> {
        let dir = data_dir().map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        Self::open_at(dir.join("pomodoro.db"))
    }

    /// Open (creating if needed) a database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| StorageError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self::from_connection(conn, Some(path))?;
        if let Some(path) = &db.path {
            info!(path = %path.display(), "session database opened");
        }
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if migration fails.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self, StorageError> {
        migrations::migrate(&conn).map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every stored session, newest first.
    pub fn all_sessions(&self) -> Result<Vec<SessionRecord>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY completed_at DESC"))?;
        let rows = stmt.query_map([], read_row)?;
        collect_records(rows)
    }

    /// Bulk delete of the whole history. Returns the number of rows removed.
    pub fn delete_all(&self) -> Result<usize, StorageError> {
        Ok(self.conn().execute("DELETE FROM sessions", [])?)
    }

    pub fn get(&self, id: i64) -> Result<Option<SessionRecord>, StorageError> {
        let conn = self.conn();
        let raw = conn
            .query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), params![id], read_row)
            .optional()?;
        raw.map(RawRecord::into_record).transpose()
    }
}

impl RecordStore for Database {
    fn insert(&self, record: &SessionRecord) -> Result<i64, StorageError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sessions (phase_kind, duration_minutes, completed_at, linked_task_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.phase_kind.as_str(),
                record.duration_minutes,
                record.completed_at_epoch_ms,
                record.linked_task_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn query_range(
        &self,
        start_ms: i64,
        end_ms: i64,
        kind: Option<PhaseKind>,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE completed_at >= ?1 AND completed_at <= ?2
               AND (?3 IS NULL OR phase_kind = ?3)
             ORDER BY completed_at ASC"
        ))?;
        let rows = stmt.query_map(
            params![start_ms, end_ms, kind.map(|k| k.as_str())],
            read_row,
        )?;
        collect_records(rows)
    }

    fn sum_duration(&self, kind: PhaseKind, since_ms: i64) -> Result<u64, StorageError> {
        let total: i64 = self.conn().query_row(
            "SELECT COALESCE(SUM(duration_minutes), 0)
             FROM sessions
             WHERE phase_kind = ?1 AND completed_at >= ?2",
            params![kind.as_str(), since_ms],
            |row| row.get(0),
        )?;
        Ok(total.max(0) as u64)
    }

    fn count_since(&self, kind: PhaseKind, since_ms: i64) -> Result<u64, StorageError> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*)
             FROM sessions
             WHERE phase_kind = ?1 AND completed_at >= ?2",
            params![kind.as_str(), since_ms],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

/// Row as stored, before the kind string is validated.
struct RawRecord {
    id: i64,
    phase_kind: String,
    duration_minutes: u32,
    completed_at: i64,
    linked_task_id: Option<i64>,
}

impl RawRecord {
    fn into_record(self) -> Result<SessionRecord, StorageError> {
        let kind = self
            .phase_kind
            .parse::<PhaseKind>()
            .map_err(|message| StorageError::InvalidRow {
                table: "sessions".into(),
                message,
            })?;
        Ok(SessionRecord::new(kind, self.duration_minutes, self.completed_at, self.linked_task_id)
            .with_id(self.id))
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        id: row.get(0)?,
        phase_kind: row.get(1)?,
        duration_minutes: row.get(2)?,
        completed_at: row.get(3)?,
        linked_task_id: row.get(4)?,
    })
}

fn collect_records(
    rows: impl Iterator<Item = rusqlite::Result<RawRecord>>,
) -> Result<Vec<SessionRecord>, StorageError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?.into_record()?);
    }
    Ok(out)
}
