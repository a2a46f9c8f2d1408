#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the `DuckDB` data directory.
//!
//! All paths are relative to the project root's `data/` directory unless
//! overridden by `SEPTIC_DB_PATH` or `SEPTIC_LOOKUP_LOG_PATH`.

use std::path::{Path, PathBuf};

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`. Falls back to the
/// current directory when the manifest is not nested two levels deep.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the default feature store path (`data/septic.duckdb`).
#[must_use]
pub fn default_store_path() -> PathBuf {
    data_dir().join("septic.duckdb")
}

/// Returns the feature store path, honoring `SEPTIC_DB_PATH`.
#[must_use]
pub fn store_path_from_env() -> PathBuf {
    std::env::var("SEPTIC_DB_PATH").map_or_else(|_| default_store_path(), PathBuf::from)
}

/// Returns the default lookup log path (`data/septic_lookups.duckdb`).
#[must_use]
pub fn default_lookup_log_path() -> PathBuf {
    data_dir().join("septic_lookups.duckdb")
}

/// Returns the lookup log path, honoring `SEPTIC_LOOKUP_LOG_PATH`.
#[must_use]
pub fn lookup_log_path_from_env() -> PathBuf {
    std::env::var("SEPTIC_LOOKUP_LOG_PATH").map_or_else(|_| default_lookup_log_path(), PathBuf::from)
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
