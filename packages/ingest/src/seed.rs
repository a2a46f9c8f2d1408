//! Source registration from TOML seed files.
//!
//! A seed file holds a `[[sources]]` array. Each entry becomes (or
//! updates) a row in `septic_sources`; record counts are maintained by the
//! import pipeline, never by the seed.

use std::path::Path;

use duckdb::Connection;
use septic_locator_database::feature_db;
use septic_locator_septic_models::{BoundingBox, GeometryType, Source, SourceQuality};
use serde::Deserialize;

use crate::IngestError;

/// Embedded seed for the Florida DOH datasets.
pub const FLORIDA_SEED: &str = include_str!("../sources/florida.toml");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedFile {
    #[serde(default)]
    sources: Vec<SourceSeed>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SourceSeed {
    id: String,
    name: String,
    state: String,
    county: Option<String>,
    quality: SourceQuality,
    geometry_type: GeometryType,
    bbox: Option<BoundingBox>,
}

/// Parses and validates a seed document.
///
/// # Errors
///
/// Returns [`IngestError::Toml`] for malformed TOML and
/// [`IngestError::InvalidSource`] for a blank ID, a duplicate ID, or an
/// extent outside WGS84 bounds.
pub fn parse_seed(text: &str) -> Result<Vec<Source>, IngestError> {
    let file: SeedFile = toml::de::from_str(text)?;
    let mut seen = std::collections::BTreeSet::new();
    let mut sources = Vec::with_capacity(file.sources.len());

    for seed in file.sources {
        let id = seed.id.trim().to_string();
        if id.is_empty() {
            return Err(IngestError::InvalidSource {
                message: format!("source {:?} has a blank id", seed.name),
            });
        }
        if !seen.insert(id.clone()) {
            return Err(IngestError::InvalidSource {
                message: format!("duplicate source id {id}"),
            });
        }
        if let Some(bbox) = seed.bbox
            && !is_valid_extent(&bbox)
        {
            return Err(IngestError::InvalidSource {
                message: format!("source {id} has an invalid bbox {bbox:?}"),
            });
        }

        sources.push(Source {
            id,
            name: seed.name,
            state: seed.state,
            county: seed.county,
            quality: seed.quality,
            geometry_type: seed.geometry_type,
            record_count: 0,
            bbox: seed.bbox,
        });
    }

    Ok(sources)
}

/// Upserts every source in `text` and returns how many were written.
///
/// # Errors
///
/// Returns [`IngestError`] if the seed is invalid or a write fails.
pub fn seed_sources(conn: &Connection, text: &str) -> Result<usize, IngestError> {
    let sources = parse_seed(text)?;
    for source in &sources {
        feature_db::upsert_source(conn, source)?;
        log::info!("Registered source {} ({})", source.id, source.name);
    }
    Ok(sources.len())
}

/// Reads a seed file from disk and upserts its sources.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read, is invalid, or a
/// write fails.
pub fn seed_sources_from_file(conn: &Connection, path: &Path) -> Result<usize, IngestError> {
    let text = std::fs::read_to_string(path)?;
    seed_sources(conn, &text)
}

fn is_valid_extent(bbox: &BoundingBox) -> bool {
    septic_locator_septic_models::is_valid_wgs84(bbox.south, bbox.west)
        && septic_locator_septic_models::is_valid_wgs84(bbox.north, bbox.east)
        && bbox.west <= bbox.east
        && bbox.south <= bbox.north
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_florida_seed_parses() {
        let sources = parse_seed(FLORIDA_SEED).unwrap();
        assert_eq!(sources.len(), 3);
        assert!(sources.iter().all(|s| s.state == "FL"));
        assert_eq!(sources[2].geometry_type, GeometryType::Polygon);
        assert!(sources[2].bbox.is_none());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let text = r#"
            [[sources]]
            id = "a"
            name = "A"
            state = "FL"
            quality = "high"
            geometry_type = "POINT"

            [[sources]]
            id = "a"
            name = "A again"
            state = "FL"
            quality = "low"
            geometry_type = "POINT"
        "#;
        assert!(matches!(
            parse_seed(text),
            Err(IngestError::InvalidSource { .. })
        ));
    }

    #[test]
    fn rejects_inverted_bbox() {
        let text = r#"
            [[sources]]
            id = "a"
            name = "A"
            state = "FL"
            quality = "high"
            geometry_type = "POINT"
            bbox = { west = -80.0, south = 27.0, east = -82.0, north = 28.0 }
        "#;
        assert!(matches!(
            parse_seed(text),
            Err(IngestError::InvalidSource { .. })
        ));
    }

    #[test]
    fn rejects_unknown_quality() {
        let text = r#"
            [[sources]]
            id = "a"
            name = "A"
            state = "FL"
            quality = "excellent"
            geometry_type = "POINT"
        "#;
        assert!(matches!(parse_seed(text), Err(IngestError::Toml(_))));
    }

    #[test]
    fn seeding_is_idempotent() {
        let conn = feature_db::open_in_memory().unwrap();
        assert_eq!(seed_sources(&conn, FLORIDA_SEED).unwrap(), 3);
        assert_eq!(seed_sources(&conn, FLORIDA_SEED).unwrap(), 3);
        assert_eq!(feature_db::load_sources(&conn).unwrap().len(), 3);
    }
}
