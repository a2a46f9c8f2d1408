//! `GeoJSON` dataset import.
//!
//! Reads a `FeatureCollection` exported from a county or state GIS portal
//! and writes one septic feature per entry. Points are stored as given;
//! polygons (parcel outlines) are reduced to their centroid and flagged as
//! such. The full property bag is kept so the normalizer can read whatever
//! columns the source published.

use std::{path::Path, sync::Arc, sync::LazyLock};

use duckdb::Connection;
use geo::Centroid as _;
use geojson::{FeatureCollection, GeoJson, JsonObject, feature::Id};
use septic_locator_database::feature_db::{self, NewFeature};
use serde::Deserialize;
use serde_json::Value;

use crate::{IngestError, progress::ProgressCallback};

/// Rows written per insert call.
const BATCH_SIZE: usize = 1_000;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImportFields {
    record_id: Vec<String>,
    parcel_id: Vec<String>,
    address: Vec<String>,
}

static FIELDS: LazyLock<ImportFields> = LazyLock::new(|| {
    toml::de::from_str(include_str!("../fields.toml"))
        .unwrap_or_else(|e| panic!("Failed to parse import field table: {e}"))
});

/// Where imported features belong.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Registered source the features are attributed to.
    pub source_id: String,
    /// County recorded on every feature.
    pub county: String,
    /// State recorded on every feature.
    pub state: String,
    /// Provenance tag; defaults to the source's name.
    pub data_source: Option<String>,
}

/// Outcome of one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Entries in the collection.
    pub read: u64,
    /// Rows inserted or updated.
    pub written: u64,
    /// Rows refused for coordinates outside WGS84 bounds.
    pub rejected: u64,
    /// Entries with no usable geometry.
    pub without_geometry: u64,
    /// Rows whose position is a polygon centroid.
    pub centroids: u64,
    /// Features stored for the source after the import.
    pub record_count: u64,
}

/// Imports a `GeoJSON` file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or parsed, the
/// source is not registered, or a write fails.
pub fn import_geojson_file(
    conn: &Connection,
    path: &Path,
    options: &ImportOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<ImportSummary, IngestError> {
    log::info!("Reading {}", path.display());
    let text = std::fs::read_to_string(path)?;
    import_geojson_str(conn, &text, options, progress)
}

/// Imports a `GeoJSON` document held in memory.
///
/// # Errors
///
/// Returns [`IngestError`] if the document is not a `FeatureCollection`,
/// the source is not registered, or a write fails.
pub fn import_geojson_str(
    conn: &Connection,
    text: &str,
    options: &ImportOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<ImportSummary, IngestError> {
    let source = feature_db::load_sources(conn)?
        .into_iter()
        .find(|s| s.id == options.source_id)
        .ok_or_else(|| IngestError::InvalidSource {
            message: format!(
                "source {} is not registered; seed it before importing",
                options.source_id
            ),
        })?;
    let data_source = options
        .data_source
        .clone()
        .unwrap_or_else(|| source.name.clone());

    let collection = FeatureCollection::try_from(text.parse::<GeoJson>()?)?;
    let read = collection.features.len() as u64;

    let mut summary = ImportSummary {
        read,
        ..ImportSummary::default()
    };
    let rows = to_new_features(collection, options, &data_source, &mut summary);

    progress.set_total(rows.len() as u64);
    progress.set_message(format!("Importing into {}", source.id));

    for chunk in rows.chunks(BATCH_SIZE) {
        let stats = feature_db::insert_features(conn, chunk)?;
        summary.written += stats.written;
        summary.rejected += stats.rejected;
        progress.inc(chunk.len() as u64);
    }

    summary.record_count = feature_db::refresh_record_count(conn, &source.id)?;
    progress.finish(format!(
        "{}: {} written, {} rejected",
        source.id, summary.written, summary.rejected
    ));

    log::info!(
        "Imported {} of {read} features into {} ({} centroids, {} without geometry, {} rejected); source now holds {}",
        summary.written,
        source.id,
        summary.centroids,
        summary.without_geometry,
        summary.rejected,
        summary.record_count,
    );
    Ok(summary)
}

fn to_new_features(
    collection: FeatureCollection,
    options: &ImportOptions,
    data_source: &str,
    summary: &mut ImportSummary,
) -> Vec<NewFeature> {
    let mut rows = Vec::with_capacity(collection.features.len());

    for (index, feature) in collection.features.into_iter().enumerate() {
        let properties = feature.properties.unwrap_or_default();

        let positions = feature.geometry.map(positions_of).unwrap_or_default();
        if positions.is_empty() {
            summary.without_geometry += 1;
            continue;
        }

        let record_id = first_text(&properties, &FIELDS.record_id)
            .or_else(|| feature.id.map(|id| id_text(&id)))
            .unwrap_or_else(|| format!("row-{index}"));
        let parcel_id = first_text(&properties, &FIELDS.parcel_id);
        let address = first_text(&properties, &FIELDS.address);
        let attributes = Value::Object(properties);

        // Each point of a MultiPoint becomes its own row: "{id}-1", "{id}-2", ...
        let split = positions.len() > 1;
        for (n, (lng, lat, centroid_derived)) in positions.into_iter().enumerate() {
            if centroid_derived {
                summary.centroids += 1;
            }
            rows.push(NewFeature {
                source_id: options.source_id.clone(),
                record_id: if split {
                    format!("{record_id}-{}", n + 1)
                } else {
                    record_id.clone()
                },
                county: options.county.clone(),
                state: options.state.clone(),
                parcel_id: parcel_id.clone(),
                address: address.clone(),
                lat,
                lng,
                centroid_derived,
                attributes: attributes.clone(),
                data_source: data_source.to_string(),
            });
        }
    }

    if summary.without_geometry > 0 {
        log::warn!(
            "Skipped {} features with no usable geometry",
            summary.without_geometry
        );
    }

    rows
}

/// `(lng, lat, centroid_derived)` for each stored position of a geometry.
fn positions_of(geometry: geojson::Geometry) -> Vec<(f64, f64, bool)> {
    let Ok(geometry) = geo::Geometry::<f64>::try_from(geometry) else {
        return Vec::new();
    };
    match geometry {
        geo::Geometry::Point(p) => vec![(p.x(), p.y(), false)],
        geo::Geometry::MultiPoint(mp) => mp.0.iter().map(|p| (p.x(), p.y(), false)).collect(),
        geo::Geometry::Polygon(p) => {
            p.centroid().map(|c| (c.x(), c.y(), true)).into_iter().collect()
        }
        geo::Geometry::MultiPolygon(mp) => {
            mp.centroid().map(|c| (c.x(), c.y(), true)).into_iter().collect()
        }
        _ => Vec::new(),
    }
}

fn first_text(properties: &JsonObject, keys: &[String]) -> Option<String> {
    keys.iter().find_map(|key| match properties.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn id_text(id: &Id) -> String {
    match id {
        Id::String(s) => s.clone(),
        Id::Number(n) => n.to_string(),
    }
}
