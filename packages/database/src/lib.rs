#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! `DuckDB` feature store for the septic locator.
//!
//! The feature store (default `data/septic.duckdb`) holds
//! `septic_features` (one row per government septic record) and
//! `septic_sources` (dataset metadata and coverage extents). The query log
//! lives in its own file (default `data/septic_lookups.duckdb`) so that
//! serving lookups never holds a lock on the feature store. Spatial indexing happens in memory in
//! `septic_locator_spatial`; this crate only stores and loads rows.

pub mod feature_db;
pub mod lookup_log;
pub mod paths;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// I/O error (creating the data directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Attribute JSON could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The database file does not exist.
    #[error("Database file not found: {}", path.display())]
    NotFound {
        /// The path that was tried.
        path: std::path::PathBuf,
    },

    /// The store was opened but its tables were never created.
    #[error("Missing schema: table {table} does not exist")]
    MissingSchema {
        /// The table that was expected.
        table: &'static str,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
