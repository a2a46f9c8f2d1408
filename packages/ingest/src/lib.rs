#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Loads septic datasets into the `DuckDB` feature store.
//!
//! Sources are registered from TOML seed files ([`seed`]); their records
//! are then imported from `GeoJSON` exports ([`geojson_import`]). Both are
//! synchronous and meant to run from the CLI while the server is stopped
//! or before an index reload.

pub mod geojson_import;
pub mod progress;
pub mod seed;

pub use geojson_import::{ImportOptions, ImportSummary, import_geojson_file};
pub use seed::{seed_sources, seed_sources_from_file};

use septic_locator_database::DbError;

/// Errors that can occur while importing or seeding.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Feature store error.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// The input file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input is not valid `GeoJSON` or not a `FeatureCollection`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// A seed file is not valid TOML or does not match the seed schema.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A source definition is unusable or missing.
    #[error("Invalid source: {message}")]
    InvalidSource {
        /// Description of what went wrong.
        message: String,
    },
}
