//! Implementations shared by the subcommands and the interactive menu.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use septic_locator_cli_utils::{IndicatifProgress, MultiProgress};
use septic_locator_database::{feature_db, lookup_log::LookupLog, paths};
use septic_locator_ingest::{ImportOptions, seed as source_seed};
use septic_locator_lookup::{IndexedStore, LookupConfig, SepticLookup};
use septic_locator_septic_models::LatLng;

/// Creates the store file and its tables.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the DDL fails.
pub fn migrate(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Creating schema in {}...", path.display());
    feature_db::open(path)?;
    log::info!("Migrations complete.");
    Ok(())
}

/// Registers sources from `file`, or the bundled Florida seed when `None`.
///
/// # Errors
///
/// Returns an error if the seed is invalid or the store cannot be written.
pub fn seed(path: &Path, file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let conn = feature_db::open(path)?;
    let count = match file {
        Some(file) => source_seed::seed_sources_from_file(&conn, file)?,
        None => source_seed::seed_sources(&conn, source_seed::FLORIDA_SEED)?,
    };
    println!("Registered {count} sources.");
    Ok(())
}

/// Imports a `GeoJSON` file with a progress bar.
///
/// # Errors
///
/// Returns an error if the import fails.
pub fn import(
    path: &Path,
    file: &Path,
    options: &ImportOptions,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let conn = feature_db::open(path)?;
    let progress = IndicatifProgress::import_bar(multi, &format!("Reading {}", file.display()));

    let summary = septic_locator_ingest::import_geojson_file(&conn, file, options, &progress)?;

    println!(
        "Imported {} of {} features into {} in {:.1}s ({} centroids, {} without geometry, {} rejected). Source now holds {} records.",
        summary.written,
        summary.read,
        options.source_id,
        start.elapsed().as_secs_f64(),
        summary.centroids,
        summary.without_geometry,
        summary.rejected,
        summary.record_count,
    );
    println!(
        "A running server serves the new data after its next reload \
         (SEPTIC_RELOAD_INTERVAL_SECS or POST /api/admin/reload)."
    );
    Ok(())
}

/// Prints the registered sources.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn list_sources(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let conn = feature_db::open_read_only(path)?;
    let sources = feature_db::load_sources(&conn)?;

    println!("{:<32} {:<6} {:<8} {:>10}  NAME", "ID", "STATE", "QUALITY", "RECORDS");
    println!("{}", "-".repeat(80));
    for source in &sources {
        println!(
            "{:<32} {:<6} {:<8} {:>10}  {}",
            source.id, source.state, source.quality, source.record_count, source.name
        );
    }
    println!();
    println!("{} sources", sources.len());
    Ok(())
}

/// Classifies one point and prints the result as JSON.
///
/// # Errors
///
/// Returns an error if the coordinates are invalid, the store does not
/// exist, or the result cannot be encoded.
pub async fn lookup(
    path: &Path,
    lat: f64,
    lng: f64,
    radius: Option<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let point = LatLng::try_new(lat, lng)?;
    let config = LookupConfig::from_env();
    let conn = feature_db::open_read_only(path)?;
    let store = Arc::new(IndexedStore::new(
        conn,
        config.coverage_fallback_radius_meters,
    ));
    let engine = SepticLookup::new(store, config);

    let result = engine.lookup(point, radius).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Prints the most recent logged lookups from the log at `log_path`.
///
/// # Errors
///
/// Returns an error if the log does not exist or cannot be read.
pub fn history(log_path: &Path, limit: u32) -> Result<(), Box<dyn std::error::Error>> {
    let entries = LookupLog::open_existing(log_path)?.recent(limit)?;

    println!(
        "{:<12} {:<12} {:<14} {:<8} ADDRESS",
        "LAT", "LNG", "RESULT", "CONF"
    );
    println!("{}", "-".repeat(72));
    for entry in &entries {
        println!(
            "{:<12.6} {:<12.6} {:<14} {:<8} {}",
            entry.lat,
            entry.lng,
            entry.classification,
            entry.confidence,
            entry.address.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

/// Runs the API server on its own actix system.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    // actix-web needs its own runtime; nesting it inside tokio's would panic.
    tokio::task::spawn_blocking(|| {
        actix_web::rt::System::new().block_on(septic_locator_server::run_server())
    })
    .await??;
    Ok(())
}

/// Resolves the store path from a flag or the environment.
#[must_use]
pub fn store_path(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(paths::store_path_from_env)
}

/// Resolves the lookup log path from a flag or the environment.
#[must_use]
pub fn log_path(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(paths::lookup_log_path_from_env)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "septic_locator_cli_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir.join("septic.duckdb")
    }

    #[test]
    fn migrate_then_seed_then_list() {
        let path = temp_store("seed");
        migrate(&path).unwrap();
        seed(&path, None).unwrap();

        let conn = feature_db::open_existing(&path).unwrap();
        assert_eq!(feature_db::load_sources(&conn).unwrap().len(), 3);
        drop(conn);

        list_sources(&path).unwrap();
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn history_reads_lookup_log() {
        let path = temp_store("history").with_file_name("lookups.duckdb");
        LookupLog::open(&path).unwrap();
        history(&path, 5).unwrap();
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn lookup_rejects_invalid_coordinates() {
        let path = temp_store("lookup");
        assert!(lookup(&path, 91.0, 0.0, None).await.is_err());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn mistyped_store_path_leaves_nothing_behind() {
        let path = temp_store("typo");
        assert!(lookup(&path, 27.95, -82.45, None).await.is_err());
        assert!(list_sources(&path).is_err());
        assert!(history(&path, 5).is_err());
        assert!(!path.parent().unwrap().exists());
    }
}
