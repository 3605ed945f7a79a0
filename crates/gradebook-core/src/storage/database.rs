//! SQLite storage for the roster snapshot and the delivery log.
//!
//! Provides persistent storage for:
//! - The roster, as one JSON document in the key-value table
//! - Every reminder email attempt, sent or failed

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::data_dir;
use crate::error::{CoreError, DatabaseError, Result};
use crate::events::DeliveryKind;
use crate::roster::Roster;

/// Key of the roster snapshot in the kv table.
pub const ROSTER_KEY: &str = "roster";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

/// One reminder email attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub class_id: String,
    pub student_cpf: String,
    pub goal: String,
    pub kind: DeliveryKind,
    pub status: DeliveryStatus,
    /// Transport error text for failed attempts.
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

/// A logged [`Delivery`] with its row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: i64,
    #[serde(flatten)]
    pub delivery: Delivery,
}

/// How long a writer waits for another process's write transaction.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database holding the roster snapshot and delivery log.
///
/// Several processes may open the same file. Roster changes go through
/// [`begin_immediate`](Self::begin_immediate) so writers queue on the
/// SQLite write lock instead of overwriting each other.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data_dir>/gradebook.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("gradebook.db"))
    }

    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS deliveries (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    class_id    TEXT NOT NULL,
                    student_cpf TEXT NOT NULL,
                    goal        TEXT NOT NULL,
                    kind        TEXT NOT NULL,
                    status      TEXT NOT NULL,
                    detail      TEXT,
                    at          TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_deliveries_class_at ON deliveries(class_id, at);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Change how long a blocked writer waits before giving up.
    ///
    /// # Errors
    /// Returns an error if SQLite rejects the setting.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<(), rusqlite::Error> {
        self.conn.busy_timeout(timeout)
    }

    // ── Transactions ─────────────────────────────────────────────────

    /// Start a write transaction, taking the database write lock now rather
    /// than at the first write.
    pub fn begin_immediate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch("BEGIN IMMEDIATE")
    }

    pub fn commit(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch("COMMIT")
    }

    pub fn rollback(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch("ROLLBACK")
    }

    // ── Key-value ────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // ── Roster snapshot ──────────────────────────────────────────────

    /// Load the last roster snapshot, `None` on a fresh database.
    ///
    /// # Errors
    /// Returns [`DatabaseError::CorruptSnapshot`] if the stored JSON does not
    /// decode.
    pub fn load_roster(&self) -> Result<Option<Roster>> {
        let Some(json) = self.kv_get(ROSTER_KEY)? else {
            return Ok(None);
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| {
                CoreError::Database(DatabaseError::CorruptSnapshot {
                    key: ROSTER_KEY.to_string(),
                    message: e.to_string(),
                })
            })
    }

    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save_roster(&self, roster: &Roster) -> Result<()> {
        let json = serde_json::to_string(roster)?;
        self.kv_set(ROSTER_KEY, &json)?;
        Ok(())
    }

    // ── Delivery log ─────────────────────────────────────────────────

    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_delivery(&self, delivery: &Delivery) -> Result<i64, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO deliveries (class_id, student_cpf, goal, kind, status, detail, at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                delivery.class_id,
                delivery.student_cpf,
                delivery.goal,
                delivery.kind.as_str(),
                delivery.status.as_str(),
                delivery.detail,
                delivery.at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent deliveries first, optionally for one class.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row does not decode.
    pub fn list_deliveries(
        &self,
        class_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<DeliveryRecord>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, class_id, student_cpf, goal, kind, status, detail, at
             FROM deliveries
             WHERE ?1 IS NULL OR class_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![class_id, limit], |row| {
            let kind: String = row.get(4)?;
            let status: String = row.get(5)?;
            let at: String = row.get(7)?;
            Ok(DeliveryRecord {
                id: row.get(0)?,
                delivery: Delivery {
                    class_id: row.get(1)?,
                    student_cpf: row.get(2)?,
                    goal: row.get(3)?,
                    kind: parse_kind(4, &kind)?,
                    status: parse_status(5, &status)?,
                    detail: row.get(6)?,
                    at: DateTime::parse_from_rfc3339(&at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e))
                        })?,
                },
            })
        })?;
        rows.collect()
    }
}

fn parse_kind(idx: usize, raw: &str) -> Result<DeliveryKind, rusqlite::Error> {
    match raw {
        "ad_hoc" => Ok(DeliveryKind::AdHoc),
        "scheduled" => Ok(DeliveryKind::Scheduled),
        "auto_resend" => Ok(DeliveryKind::AutoResend),
        other => Err(conversion_error(idx, format!("unknown delivery kind '{other}'"))),
    }
}

fn parse_status(idx: usize, raw: &str) -> Result<DeliveryStatus, rusqlite::Error> {
    match raw {
        "sent" => Ok(DeliveryStatus::Sent),
        "failed" => Ok(DeliveryStatus::Failed),
        other => Err(conversion_error(idx, format!("unknown delivery status '{other}'"))),
    }
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}
