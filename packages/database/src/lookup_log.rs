//! Query log for analytics and abuse detection.
//!
//! Every lookup served over HTTP is recorded here. Writes are best-effort:
//! callers spawn them off the request path and only log failures.
//!
//! The log lives in its own `DuckDB` file. [`LookupLog`] opens that file for
//! each write and closes it again, so `septic_locator history` can read the
//! log while the server is running.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use duckdb::Connection;

use crate::DbError;

/// Table holding one row per logged lookup.
pub const LOOKUPS_TABLE: &str = "septic_lookups";

/// One logged lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupLogEntry {
    /// Unique entry ID.
    pub id: String,
    /// Free-text address the caller geocoded, if supplied.
    pub address: Option<String>,
    /// Query latitude.
    pub lat: f64,
    /// Query longitude.
    pub lng: f64,
    /// Classification returned.
    pub classification: String,
    /// Confidence returned.
    pub confidence: String,
    /// Compact JSON summary of the result.
    pub result_summary: serde_json::Value,
}

/// Creates the lookup log table if it does not exist.
///
/// # Errors
///
/// Returns [`DbError`] if the DDL fails.
pub fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS septic_lookups (
            id TEXT PRIMARY KEY,
            address TEXT,
            latitude DOUBLE NOT NULL,
            longitude DOUBLE NOT NULL,
            classification TEXT NOT NULL,
            confidence TEXT NOT NULL,
            result_summary TEXT,
            created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        );",
    )?;
    Ok(())
}

enum Target {
    File {
        path: PathBuf,
        /// Serializes opens within this process.
        guard: Mutex<()>,
    },
    Connection(Mutex<Connection>),
}

/// Handle to the lookup log.
pub struct LookupLog {
    target: Target,
}

impl LookupLog {
    /// Creates the log file and its table if needed.
    ///
    /// No connection is kept open afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the file or table cannot be created.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }
        create_schema(&Connection::open(path)?)?;

        Ok(Self {
            target: Target::File {
                path: path.to_path_buf(),
                guard: Mutex::new(()),
            },
        })
    }

    /// Attaches to an existing log file without creating anything.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if `path` does not exist.
    pub fn open_existing(path: &Path) -> Result<Self, DbError> {
        crate::feature_db::require_file(path)?;

        Ok(Self {
            target: Target::File {
                path: path.to_path_buf(),
                guard: Mutex::new(()),
            },
        })
    }

    /// An in-memory log that lives as long as the handle.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or table cannot be created.
    pub fn in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        create_schema(&conn)?;
        Ok(Self {
            target: Target::Connection(Mutex::new(conn)),
        })
    }

    /// Appends `entry`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the log cannot be opened or written.
    pub fn record(&self, entry: &LookupLogEntry) -> Result<(), DbError> {
        self.with_connection(|conn| insert_lookup(conn, entry))
    }

    /// The most recent `limit` entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the log cannot be opened or read.
    pub fn recent(&self, limit: u32) -> Result<Vec<LookupLogEntry>, DbError> {
        self.with_connection(|conn| recent_lookups(conn, limit))
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        match &self.target {
            Target::File { path, guard } => {
                let _guard = guard.lock().unwrap_or_else(PoisonError::into_inner);
                let conn = Connection::open(path)?;
                f(&conn)
            }
            Target::Connection(conn) => {
                let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
                f(&conn)
            }
        }
    }
}

/// Appends an entry to the lookup log.
///
/// # Errors
///
/// Returns [`DbError`] if the insert or JSON encoding fails.
pub fn insert_lookup(conn: &Connection, entry: &LookupLogEntry) -> Result<(), DbError> {
    let summary = serde_json::to_string(&entry.result_summary)?;
    conn.execute(
        "INSERT INTO septic_lookups (
            id, address, latitude, longitude, classification, confidence, result_summary
         ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        duckdb::params![
            entry.id,
            entry.address.as_deref(),
            entry.lat,
            entry.lng,
            entry.classification,
            entry.confidence,
            summary,
        ],
    )?;
    Ok(())
}

/// Returns the most recent entries, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn recent_lookups(conn: &Connection, limit: u32) -> Result<Vec<LookupLogEntry>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, address, latitude, longitude, classification, confidence, result_summary
         FROM septic_lookups
         ORDER BY created_at DESC, id
         LIMIT ?",
    )?;
    let mut rows = stmt.query([i64::from(limit)])?;
    let mut entries = Vec::new();

    while let Some(row) = rows.next()? {
        let summary: Option<String> = row.get(6)?;
        entries.push(LookupLogEntry {
            id: row.get(0)?,
            address: row.get(1)?,
            lat: row.get(2)?,
            lng: row.get(3)?,
            classification: row.get(4)?,
            confidence: row.get(5)?,
            result_summary: summary
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or(serde_json::Value::Null),
        });
    }

    Ok(entries)
}
