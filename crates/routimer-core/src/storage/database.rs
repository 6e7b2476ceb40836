//! SQLite-based routine storage.
//!
//! Provides persistent storage for:
//! - Routine definitions and their last-used timestamps
//! - Scheduled post-session reminders
//! - Key-value store for application state (the suspension checkpoint slot)

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{CoreError, DatabaseError, Result};
use crate::routine::{NewRoutine, Routine, RoutineUsage};
use crate::timer::{CheckpointStore, SuspendedCheckpoint};
use crate::traits::{RoutineRepository, UsageLog};

const CHECKPOINT_KEY: &str = "suspended_checkpoint";

/// A reminder waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledReminder {
    pub id: String,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// SQLite database for routines, reminders and app state.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `<data_dir>/routimer.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("routimer.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves SQLite consistent; keep using the connection.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn migrate(&self) -> Result<()> {
        self.conn().execute_batch(
            "CREATE TABLE IF NOT EXISTS routines (
                id               TEXT PRIMARY KEY,
                name             TEXT NOT NULL,
                preparation_secs INTEGER NOT NULL DEFAULT 0,
                work_secs        INTEGER NOT NULL,
                sets             INTEGER NOT NULL,
                rest_secs        INTEGER NOT NULL DEFAULT 0,
                created_at       TEXT NOT NULL,
                last_used        TEXT
            );

            CREATE TABLE IF NOT EXISTS reminders (
                id         TEXT PRIMARY KEY,
                title      TEXT NOT NULL,
                body       TEXT NOT NULL,
                fire_at    TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_routines_last_used ON routines(last_used);
            CREATE INDEX IF NOT EXISTS idx_reminders_fire_at ON reminders(fire_at);",
        )?;
        Ok(())
    }

    // ── Routines ─────────────────────────────────────────────────────

    /// Validate and insert a new routine, assigning its id.
    pub fn save_routine(&self, new: NewRoutine) -> Result<Routine> {
        new.validate()?;
        let routine = new.into_routine();
        self.conn().execute(
            "INSERT INTO routines (id, name, preparation_secs, work_secs, sets, rest_secs, created_at, last_used)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)",
            params![
                routine.id,
                routine.name,
                routine.preparation_secs,
                routine.work_secs,
                routine.sets,
                routine.rest_secs,
                fmt_ts(&routine.created_at),
            ],
        )?;
        Ok(routine)
    }

    pub fn list_routines(&self) -> Result<Vec<Routine>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, preparation_secs, work_secs, sets, rest_secs, created_at, last_used
             FROM routines ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], routine_from_row)?;
        let mut routines = Vec::new();
        for row in rows {
            routines.push(row?);
        }
        Ok(routines)
    }

    /// Replace a routine's editable fields. Unknown ids are ignored.
    pub fn update_routine(&self, routine: &Routine) -> Result<bool> {
        routine.validate()?;
        let changed = self.conn().execute(
            "UPDATE routines
             SET name = ?2, preparation_secs = ?3, work_secs = ?4, sets = ?5, rest_secs = ?6
             WHERE id = ?1",
            params![
                routine.id,
                routine.name,
                routine.preparation_secs,
                routine.work_secs,
                routine.sets,
                routine.rest_secs,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_routine(&self, id: &str) -> Result<bool> {
        let changed = self
            .conn()
            .execute("DELETE FROM routines WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Routines that have been used at least once, most recent first.
    pub fn routine_history(&self) -> Result<Vec<RoutineUsage>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, last_used FROM routines
             WHERE last_used IS NOT NULL
             ORDER BY last_used DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RoutineUsage {
                routine_id: row.get(0)?,
                routine_name: row.get(1)?,
                used_at: parse_ts(2, &row.get::<_, String>(2)?)?,
            })
        })?;
        let mut history = Vec::new();
        for row in rows {
            history.push(row?);
        }
        Ok(history)
    }

    // ── Reminders ────────────────────────────────────────────────────

    pub fn insert_reminder(&self, title: &str, body: &str, delay_secs: u64) -> Result<ScheduledReminder> {
        let now = Utc::now();
        let fire_at = i64::try_from(delay_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let reminder = ScheduledReminder {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            body: body.to_string(),
            fire_at,
            created_at: now,
        };
        self.conn().execute(
            "INSERT INTO reminders (id, title, body, fire_at, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                reminder.id,
                reminder.title,
                reminder.body,
                fmt_ts(&reminder.fire_at),
                fmt_ts(&reminder.created_at),
            ],
        )?;
        Ok(reminder)
    }

    /// Reminders that have not fired yet, soonest first.
    pub fn pending_reminders(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledReminder>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, title, body, fire_at, created_at FROM reminders
             WHERE fire_at > ?1 ORDER BY fire_at",
        )?;
        let rows = stmt.query_map(params![fmt_ts(&now)], |row| {
            Ok(ScheduledReminder {
                id: row.get(0)?,
                title: row.get(1)?,
                body: row.get(2)?,
                fire_at: parse_ts(3, &row.get::<_, String>(3)?)?,
                created_at: parse_ts(4, &row.get::<_, String>(4)?)?,
            })
        })?;
        let mut reminders = Vec::new();
        for row in rows {
            reminders.push(row?);
        }
        Ok(reminders)
    }

    // ── Key-value ────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl RoutineRepository for Database {
    fn get_routine(&self, id: &str) -> Result<Option<Routine>> {
        let routine = self
            .conn()
            .query_row(
                "SELECT id, name, preparation_secs, work_secs, sets, rest_secs, created_at, last_used
                 FROM routines WHERE id = ?1",
                params![id],
                routine_from_row,
            )
            .optional()?;
        Ok(routine)
    }
}

impl UsageLog for Database {
    fn log_routine_usage(&self, routine_id: &str, at: DateTime<Utc>) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE routines SET last_used = ?2 WHERE id = ?1",
            params![routine_id, fmt_ts(&at)],
        )?;
        if changed == 0 {
            return Err(CoreError::NotFound(routine_id.to_string()));
        }
        Ok(())
    }
}

impl CheckpointStore for Database {
    fn save(&self, checkpoint: &SuspendedCheckpoint) -> Result<()> {
        self.kv_set(CHECKPOINT_KEY, &serde_json::to_string(checkpoint)?)
    }

    fn load(&self) -> Result<Option<SuspendedCheckpoint>> {
        let Some(json) = self.kv_get(CHECKPOINT_KEY)? else {
            return Ok(None);
        };
        let checkpoint = serde_json::from_str(&json).map_err(|e| DatabaseError::Corrupt {
            key: CHECKPOINT_KEY.to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(checkpoint))
    }

    fn clear(&self) -> Result<()> {
        self.kv_delete(CHECKPOINT_KEY)
    }
}

fn routine_from_row(row: &Row<'_>) -> rusqlite::Result<Routine> {
    let last_used: Option<String> = row.get(7)?;
    Ok(Routine {
        id: row.get(0)?,
        name: row.get(1)?,
        preparation_secs: row.get(2)?,
        work_secs: row.get(3)?,
        sets: row.get(4)?,
        rest_secs: row.get(5)?,
        created_at: parse_ts(6, &row.get::<_, String>(6)?)?,
        last_used: last_used.map(|s| parse_ts(7, &s)).transpose()?,
    })
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
