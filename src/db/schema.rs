//! Database schema and record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id INTEGER NOT NULL UNIQUE,
    user_name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS body_parts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS exercises (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    body_part_id INTEGER NOT NULL,
    name TEXT NOT NULL,

    UNIQUE (user_id, body_part_id, name),
    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (body_part_id) REFERENCES body_parts(id)
);

CREATE TABLE IF NOT EXISTS history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    user_id INTEGER NOT NULL,
    body_part_id INTEGER NOT NULL,
    exercise_id INTEGER NOT NULL,
    note TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (body_part_id) REFERENCES body_parts(id),
    FOREIGN KEY (exercise_id) REFERENCES exercises(id)
);

CREATE INDEX IF NOT EXISTS idx_history_user_exercise ON history(user_id, exercise_id, created_at);
CREATE INDEX IF NOT EXISTS idx_history_user_created ON history(user_id, created_at);
";

/// Body part catalog, inserted once in this order
pub const SEED_BODY_PARTS: &str = r"
INSERT OR IGNORE INTO body_parts (name) VALUES
    ('Chest'),
    ('Back'),
    ('Biceps'),
    ('Triceps'),
    ('Shoulders'),
    ('Legs'),
    ('Other');
";

/// Column width carried by names and notes
pub const MAX_TEXT_LEN: usize = 50;

/// Chat user known to the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub external_id: i64,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
}

/// `{id, name}` pair listed in menus (body parts and exercises)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i64,
    pub name: String,
}

/// Exercise owned by a (user, body part) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: i64,
    pub user_id: i64,
    pub body_part_id: i64,
    pub name: String,
}

impl Exercise {
    pub fn as_item(&self) -> CatalogItem {
        CatalogItem {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// History row to be written when a dialog is confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub user_id: i64,
    pub body_part_id: i64,
    pub exercise_id: i64,
    pub note: String,
}

/// Persisted history row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
    pub body_part_id: i64,
    pub exercise_id: i64,
    pub note: String,
}

/// Past note shown before asking for a new one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryLine {
    pub created_at: DateTime<Utc>,
    pub note: String,
}

/// One of today's records for the daily summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodayRecord {
    pub body_part: String,
    pub exercise: String,
    pub note: String,
}

/// Flattened history row for the admin export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryExportRow {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub external_user_id: i64,
    pub user_name: String,
    pub body_part: String,
    pub exercise: String,
    pub note: String,
}
