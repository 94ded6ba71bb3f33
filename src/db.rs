//! Database module for the workout log
//!
//! Provides persistence for users, the body part catalog, exercises and
//! history. Every write runs in its own transaction.

mod schema;

pub use schema::*;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(rusqlite::Error),
    #[error("Already exists: {0}")]
    Duplicate(String),
    #[error("Database connection lock poisoned")]
    Poisoned,
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                DbError::Duplicate(message.clone().unwrap_or_else(|| err.to_string()))
            }
            _ => DbError::Sqlite(err),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        conn.execute_batch(SEED_BODY_PARTS)?;
        Ok(())
    }

    // ==================== User Operations ====================

    pub fn find_user_by_external_id(&self, external_id: i64) -> DbResult<Option<User>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, external_id, user_name, created_at FROM users WHERE external_id = ?1",
            params![external_id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    external_id: row.get(1)?,
                    user_name: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(DbError::from)
    }

    pub fn create_user(&self, external_id: i64, user_name: &str) -> DbResult<User> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        tx.execute(
            "INSERT INTO users (external_id, user_name, created_at) VALUES (?1, ?2, ?3)",
            params![external_id, user_name, format_datetime(&now)],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(User {
            id,
            external_id,
            user_name: user_name.to_string(),
            created_at: now,
        })
    }

    // ==================== Catalog Operations ====================

    pub fn list_body_parts(&self) -> DbResult<Vec<CatalogItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM body_parts ORDER BY id")?;
        let rows = stmt.query_map([], parse_catalog_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn find_body_part(&self, id: i64) -> DbResult<Option<CatalogItem>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name FROM body_parts WHERE id = ?1",
            params![id],
            parse_catalog_row,
        )
        .optional()
        .map_err(DbError::from)
    }

    pub fn list_exercises(&self, user_id: i64, body_part_id: i64) -> DbResult<Vec<CatalogItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name FROM exercises
             WHERE user_id = ?1 AND body_part_id = ?2
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id, body_part_id], parse_catalog_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn find_exercise(
        &self,
        user_id: i64,
        body_part_id: i64,
        exercise_id: i64,
    ) -> DbResult<Option<CatalogItem>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name FROM exercises
             WHERE id = ?1 AND user_id = ?2 AND body_part_id = ?3",
            params![exercise_id, user_id, body_part_id],
            parse_catalog_row,
        )
        .optional()
        .map_err(DbError::from)
    }

    pub fn create_exercise(
        &self,
        user_id: i64,
        body_part_id: i64,
        name: &str,
    ) -> DbResult<Exercise> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO exercises (user_id, body_part_id, name) VALUES (?1, ?2, ?3)",
            params![user_id, body_part_id, name],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Exercise {
            id,
            user_id,
            body_part_id,
            name: name.to_string(),
        })
    }

    // ==================== History Operations ====================

    pub fn create_history_entry(&self, entry: &NewHistoryEntry) -> DbResult<HistoryEntry> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        tx.execute(
            "INSERT INTO history (created_at, user_id, body_part_id, exercise_id, note)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                format_datetime(&now),
                entry.user_id,
                entry.body_part_id,
                entry.exercise_id,
                entry.note
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(HistoryEntry {
            id,
            created_at: now,
            user_id: entry.user_id,
            body_part_id: entry.body_part_id,
            exercise_id: entry.exercise_id,
            note: entry.note.clone(),
        })
    }

    /// Last `limit` notes for an exercise, oldest first
    pub fn list_recent_history(
        &self,
        user_id: i64,
        exercise_id: i64,
        limit: usize,
    ) -> DbResult<Vec<HistoryLine>> {
        let conn = self.conn()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(
            "SELECT created_at, note FROM history
             WHERE user_id = ?1 AND exercise_id = ?2
             ORDER BY created_at DESC, id DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![user_id, exercise_id, limit], |row| {
            Ok(HistoryLine {
                created_at: parse_datetime(&row.get::<_, String>(0)?),
                note: row.get(1)?,
            })
        })?;

        let mut lines = rows.collect::<Result<Vec<_>, _>>()?;
        lines.reverse();
        Ok(lines)
    }

    /// Records created during the current local calendar day
    pub fn list_today_history(&self, user_id: i64) -> DbResult<Vec<TodayRecord>> {
        let (start, end) = day_bounds(&Local::now());
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT b.name, e.name, h.note FROM history h
             JOIN body_parts b ON b.id = h.body_part_id
             JOIN exercises e ON e.id = h.exercise_id
             WHERE h.user_id = ?1 AND h.created_at >= ?2 AND h.created_at < ?3
             ORDER BY h.body_part_id, h.created_at, h.id",
        )?;
        let rows = stmt.query_map(
            params![user_id, format_datetime(&start), format_datetime(&end)],
            |row| {
                Ok(TodayRecord {
                    body_part: row.get(0)?,
                    exercise: row.get(1)?,
                    note: row.get(2)?,
                })
            },
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn export_history(&self) -> DbResult<Vec<HistoryExportRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT h.id, h.created_at, u.external_id, u.user_name, b.name, e.name, h.note
             FROM history h
             JOIN users u ON u.id = h.user_id
             JOIN body_parts b ON b.id = h.body_part_id
             JOIN exercises e ON e.id = h.exercise_id
             ORDER BY h.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(HistoryExportRow {
                id: row.get(0)?,
                created_at: parse_datetime(&row.get::<_, String>(1)?),
                external_user_id: row.get(2)?,
                user_name: row.get(3)?,
                body_part: row.get(4)?,
                exercise: row.get(5)?,
                note: row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

fn parse_catalog_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CatalogItem> {
    Ok(CatalogItem {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

/// Fixed-width UTC timestamps so text comparison orders them correctly
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

/// UTC bounds of the calendar day containing `now`, in `now`'s time zone
///
/// Both ends are local midnights, so DST days span 23 or 25 hours.
fn day_bounds<Tz: TimeZone>(now: &DateTime<Tz>) -> (DateTime<Utc>, DateTime<Utc>) {
    let tz = now.timezone();
    let today = now.date_naive();
    let start = local_midnight(&tz, today)
        .unwrap_or_else(|| now.with_timezone(&Utc) - Duration::hours(24));
    let end = today
        .succ_opt()
        .and_then(|tomorrow| local_midnight(&tz, tomorrow))
        .unwrap_or_else(|| start + Duration::days(1));
    (start, end)
}

fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<DateTime<Utc>> {
    let midnight = date.and_time(NaiveTime::MIN);
    // Midnight inside a DST gap: the day starts when the gap ends
    [midnight, midnight + Duration::hours(1)]
        .iter()
        .find_map(|local| tz.from_local_datetime(local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}
