//! Septic feature and source storage.
//!
//! Features carry their raw attribute bag as JSON text; the engine never
//! queries inside it, so there is no reason to shred it into columns.
//! Coordinates are plain `DOUBLE` columns. Nearest-neighbor queries run
//! against the in-memory R-tree built from [`load_features`].

use std::collections::BTreeMap;
use std::path::Path;

use duckdb::{AccessMode, Config, Connection};
use septic_locator_septic_models::{
    BoundingBox, Feature, GeometryType, Source, SourceQuality, is_valid_wgs84,
};

use crate::DbError;

/// Number of rows per INSERT chunk.
const CHUNK_SIZE: usize = 2_000;

/// Table holding one row per septic record.
pub const FEATURES_TABLE: &str = "septic_features";

/// Table holding data source metadata.
pub const SOURCES_TABLE: &str = "septic_sources";

/// A feature ready for insertion. The store assigns the primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFeature {
    /// Owning source ID.
    pub source_id: String,
    /// Record identifier within the source.
    pub record_id: String,
    /// County name.
    pub county: String,
    /// Two-letter state abbreviation.
    pub state: String,
    /// Parcel identifier.
    pub parcel_id: Option<String>,
    /// Street address.
    pub address: Option<String>,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
    /// Whether the point is a polygon centroid.
    pub centroid_derived: bool,
    /// Raw attribute bag.
    pub attributes: serde_json::Value,
    /// Provenance tag.
    pub data_source: String,
}

/// Outcome of [`insert_features`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertStats {
    /// Rows written (inserted or updated).
    pub written: u64,
    /// Rows rejected for invalid WGS84 coordinates.
    pub rejected: u64,
}

/// Opens (or creates) the feature store and ensures the schema exists.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    conn.execute_batch("SET threads = 4; SET memory_limit = '512MB';")?;
    create_schema(&conn)?;

    Ok(conn)
}

/// Opens an existing feature store without touching the schema.
///
/// A store that was never initialised shows up as
/// [`DbError::MissingSchema`] on first query instead of silently serving an
/// empty dataset.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if `path` does not exist, or [`DbError`]
/// if the connection fails.
pub fn open_existing(path: &Path) -> Result<Connection, DbError> {
    require_file(path)?;
    Ok(Connection::open(path)?)
}

/// Opens an existing feature store read-only.
///
/// `DuckDB` locks the file for the lifetime of the connection, so
/// long-running readers should drop the connection as soon as they have
/// loaded what they need; importers cannot write while it is held.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if `path` does not exist, or [`DbError`]
/// if the connection fails (including when another process holds the
/// write lock).
pub fn open_read_only(path: &Path) -> Result<Connection, DbError> {
    require_file(path)?;
    let config = Config::default().access_mode(AccessMode::ReadOnly)?;
    Ok(Connection::open_with_flags(path, config)?)
}

pub(crate) fn require_file(path: &Path) -> Result<(), DbError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(DbError::NotFound {
            path: path.to_path_buf(),
        })
    }
}

/// Opens an in-memory store with the schema applied.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Creates all tables if they do not exist.
///
/// # Errors
///
/// Returns [`DbError`] if any DDL statement fails.
pub fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE SEQUENCE IF NOT EXISTS septic_features_id_seq START 1;

        CREATE TABLE IF NOT EXISTS septic_features (
            id BIGINT PRIMARY KEY DEFAULT nextval('septic_features_id_seq'),
            source_id TEXT NOT NULL,
            record_id TEXT NOT NULL,
            county TEXT NOT NULL,
            state TEXT NOT NULL,
            parcel_id TEXT,
            address TEXT,
            latitude DOUBLE NOT NULL,
            longitude DOUBLE NOT NULL,
            centroid_derived BOOLEAN NOT NULL DEFAULT FALSE,
            attributes TEXT NOT NULL DEFAULT '{}',
            data_source TEXT NOT NULL,
            imported_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (source_id, record_id)
        );

        CREATE TABLE IF NOT EXISTS septic_sources (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            state TEXT NOT NULL,
            county TEXT,
            quality TEXT NOT NULL,
            geometry_type TEXT NOT NULL,
            record_count BIGINT NOT NULL DEFAULT 0,
            bbox_west DOUBLE,
            bbox_south DOUBLE,
            bbox_east DOUBLE,
            bbox_north DOUBLE
        );",
    )?;

    Ok(())
}

/// Whether `table` exists in the main schema.
///
/// # Errors
///
/// Returns [`DbError`] if the catalog query fails.
pub fn has_table(conn: &Connection, table: &str) -> Result<bool, DbError> {
    let count: i64 = conn
        .prepare("SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?")?
        .query_row([table], |row| row.get(0))?;
    Ok(count > 0)
}

fn require_table(conn: &Connection, table: &'static str) -> Result<(), DbError> {
    if has_table(conn, table)? {
        Ok(())
    } else {
        Err(DbError::MissingSchema { table })
    }
}

/// Inserts a batch of features, upserting on `(source_id, record_id)`.
///
/// Features outside WGS84 bounds are rejected here so they can never reach
/// query time. Duplicate keys within the batch keep the last occurrence.
/// Re-importing a record overwrites its row.
///
/// # Errors
///
/// Returns [`DbError`] if any database operation or JSON encoding fails.
pub fn insert_features(conn: &Connection, features: &[NewFeature]) -> Result<InsertStats, DbError> {
    let mut stats = InsertStats::default();

    let mut last_seen: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for (i, feature) in features.iter().enumerate() {
        if is_valid_wgs84(feature.lat, feature.lng) {
            last_seen.insert((feature.source_id.as_str(), feature.record_id.as_str()), i);
        } else {
            stats.rejected += 1;
            log::warn!(
                "Rejecting feature {}/{}: invalid coordinates ({}, {})",
                feature.source_id,
                feature.record_id,
                feature.lat,
                feature.lng
            );
        }
    }

    let mut indices: Vec<usize> = last_seen.into_values().collect();
    indices.sort_unstable();
    let accepted: Vec<&NewFeature> = indices.into_iter().map(|i| &features[i]).collect();

    for chunk in accepted.chunks(CHUNK_SIZE) {
        let mut sql = String::from(
            "INSERT INTO septic_features (
                source_id, record_id, county, state, parcel_id, address,
                latitude, longitude, centroid_derived, attributes, data_source
            ) VALUES ",
        );

        for i in 0..chunk.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str("(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)");
        }

        sql.push_str(
            " ON CONFLICT (source_id, record_id) DO UPDATE SET
                county = EXCLUDED.county,
                state = EXCLUDED.state,
                parcel_id = EXCLUDED.parcel_id,
                address = EXCLUDED.address,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                centroid_derived = EXCLUDED.centroid_derived,
                attributes = EXCLUDED.attributes,
                data_source = EXCLUDED.data_source",
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut idx = 1usize;

        for feature in chunk {
            let attributes = serde_json::to_string(&feature.attributes)?;

            stmt.raw_bind_parameter(idx, &feature.source_id)?;
            stmt.raw_bind_parameter(idx + 1, &feature.record_id)?;
            stmt.raw_bind_parameter(idx + 2, &feature.county)?;
            stmt.raw_bind_parameter(idx + 3, &feature.state)?;
            stmt.raw_bind_parameter(idx + 4, feature.parcel_id.as_deref())?;
            stmt.raw_bind_parameter(idx + 5, feature.address.as_deref())?;
            stmt.raw_bind_parameter(idx + 6, feature.lat)?;
            stmt.raw_bind_parameter(idx + 7, feature.lng)?;
            stmt.raw_bind_parameter(idx + 8, feature.centroid_derived)?;
            stmt.raw_bind_parameter(idx + 9, attributes)?;
            stmt.raw_bind_parameter(idx + 10, &feature.data_source)?;

            idx += 11;
        }

        let rows = stmt.raw_execute()?;
        stats.written += u64::try_from(rows).unwrap_or(0);
    }

    Ok(stats)
}

/// Loads every feature in the store.
///
/// Attribute bags that fail to parse are replaced by an empty object; the
/// record itself is still usable for classification.
///
/// # Errors
///
/// Returns [`DbError::MissingSchema`] if the features table does not
/// exist, or another [`DbError`] if the query fails.
pub fn load_features(conn: &Connection) -> Result<Vec<Feature>, DbError> {
    require_table(conn, FEATURES_TABLE)?;

    let mut stmt = conn.prepare(
        "SELECT id, source_id, record_id, county, state, parcel_id, address,
                latitude, longitude, centroid_derived, attributes, data_source
         FROM septic_features
         ORDER BY id",
    )?;
    let mut rows = stmt.query([])?;
    let mut features = Vec::new();

    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let raw_attributes: String = row.get(10)?;
        let attributes = serde_json::from_str(&raw_attributes).unwrap_or_else(|e| {
            log::warn!("Feature {id} has unparseable attributes: {e}");
            serde_json::Value::Object(serde_json::Map::new())
        });

        features.push(Feature {
            id,
            source_id: row.get(1)?,
            record_id: row.get(2)?,
            county: row.get(3)?,
            state: row.get(4)?,
            parcel_id: row.get(5)?,
            address: row.get(6)?,
            lat: row.get(7)?,
            lng: row.get(8)?,
            centroid_derived: row.get(9)?,
            attributes,
            data_source: row.get(11)?,
        });
    }

    Ok(features)
}

/// Returns the number of features stored.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn count_features(conn: &Connection) -> Result<u64, DbError> {
    require_table(conn, FEATURES_TABLE)?;
    let count: i64 = conn
        .prepare("SELECT COUNT(*) FROM septic_features")?
        .query_row([], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Loads every registered source, ordered by ID.
///
/// Rows with an unrecognised quality tier or geometry type are skipped with
/// a warning.
///
/// # Errors
///
/// Returns [`DbError::MissingSchema`] if the sources table does not exist,
/// or another [`DbError`] if the query fails.
pub fn load_sources(conn: &Connection) -> Result<Vec<Source>, DbError> {
    require_table(conn, SOURCES_TABLE)?;

    let mut stmt = conn.prepare(
        "SELECT id, name, state, county, quality, geometry_type, record_count,
                bbox_west, bbox_south, bbox_east, bbox_north
         FROM septic_sources
         ORDER BY id",
    )?;
    let mut rows = stmt.query([])?;
    let mut sources = Vec::new();

    while let Some(row) = rows.next()? {
        let id: String = row.get(0)?;
        let quality: String = row.get(4)?;
        let geometry_type: String = row.get(5)?;

        let (Ok(quality), Ok(geometry_type)) = (
            quality.parse::<SourceQuality>(),
            geometry_type.parse::<GeometryType>(),
        ) else {
            log::warn!(
                "Skipping source {id}: unrecognised quality '{quality}' or geometry type '{geometry_type}'"
            );
            continue;
        };

        let record_count: i64 = row.get(6)?;
        let bbox = match (
            row.get::<_, Option<f64>>(7)?,
            row.get::<_, Option<f64>>(8)?,
            row.get::<_, Option<f64>>(9)?,
            row.get::<_, Option<f64>>(10)?,
        ) {
            (Some(west), Some(south), Some(east), Some(north)) => {
                Some(BoundingBox::new(west, south, east, north))
            }
            _ => None,
        };

        sources.push(Source {
            id,
            name: row.get(1)?,
            state: row.get(2)?,
            county: row.get(3)?,
            quality,
            geometry_type,
            record_count: u64::try_from(record_count).unwrap_or(0),
            bbox,
        });
    }

    Ok(sources)
}

/// Inserts or updates a source.
///
/// An existing row keeps its `record_count`, which is owned by
/// [`refresh_record_count`].
///
/// # Errors
///
/// Returns [`DbError`] if the statement fails.
pub fn upsert_source(conn: &Connection, source: &Source) -> Result<(), DbError> {
    let bbox = source.bbox;
    conn.execute(
        "INSERT INTO septic_sources (
            id, name, state, county, quality, geometry_type, record_count,
            bbox_west, bbox_south, bbox_east, bbox_north
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            state = EXCLUDED.state,
            county = EXCLUDED.county,
            quality = EXCLUDED.quality,
            geometry_type = EXCLUDED.geometry_type,
            bbox_west = EXCLUDED.bbox_west,
            bbox_south = EXCLUDED.bbox_south,
            bbox_east = EXCLUDED.bbox_east,
            bbox_north = EXCLUDED.bbox_north",
        duckdb::params![
            source.id,
            source.name,
            source.state,
            source.county.as_deref(),
            source.quality.as_ref(),
            source.geometry_type.as_ref(),
            i64::try_from(source.record_count).unwrap_or(i64::MAX),
            bbox.map(|b| b.west),
            bbox.map(|b| b.south),
            bbox.map(|b| b.east),
            bbox.map(|b| b.north),
        ],
    )?;

    Ok(())
}

/// Recomputes a source's `record_count` from its stored features.
///
/// Returns the new count.
///
/// # Errors
///
/// Returns [`DbError`] if either statement fails.
pub fn refresh_record_count(conn: &Connection, source_id: &str) -> Result<u64, DbError> {
    let count: i64 = conn
        .prepare("SELECT COUNT(*) FROM septic_features WHERE source_id = ?")?
        .query_row([source_id], |row| row.get(0))?;

    conn.execute(
        "UPDATE septic_sources SET record_count = ? WHERE id = ?",
        duckdb::params![count, source_id],
    )?;

    Ok(u64::try_from(count).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(record_id: &str, lat: f64, lng: f64) -> NewFeature {
        NewFeature {
            source_id: "hillsborough_fl".to_string(),
            record_id: record_id.to_string(),
            county: "Hillsborough".to_string(),
            state: "FL".to_string(),
            parcel_id: None,
            address: Some("100 MAIN ST".to_string()),
            lat,
            lng,
            centroid_derived: false,
            attributes: serde_json::json!({"SYSTEM_TYPE": "OSTDS"}),
            data_source: "fl_doh".to_string(),
        }
    }

    fn source() -> Source {
        Source {
            id: "hillsborough_fl".to_string(),
            name: "Hillsborough County Septic Permits".to_string(),
            state: "FL".to_string(),
            county: Some("Hillsborough".to_string()),
            quality: SourceQuality::High,
            geometry_type: GeometryType::Point,
            record_count: 0,
            bbox: Some(BoundingBox::new(-82.9, 27.6, -82.0, 28.2)),
        }
    }

    #[test]
    fn rejects_invalid_coordinates_at_insert() {
        let conn = open_in_memory().unwrap();
        let stats = insert_features(
            &conn,
            &[
                feature("a", 27.95, -82.45),
                feature("b", 1_234_567.0, 456_789.0),
                feature("c", f64::NAN, -82.45),
            ],
        )
        .unwrap();

        assert_eq!(stats.written, 1);
        assert_eq!(stats.rejected, 2);
        assert_eq!(count_features(&conn).unwrap(), 1);
    }

    #[test]
    fn reimport_overwrites_coordinates() {
        let conn = open_in_memory().unwrap();
        insert_features(&conn, &[feature("a", 27.0, -82.0)]).unwrap();
        insert_features(&conn, &[feature("a", 27.95, -82.45)]).unwrap();

        let features = load_features(&conn).unwrap();
        assert_eq!(features.len(), 1);
        assert!((features[0].lat - 27.95).abs() < f64::EPSILON);
        assert_eq!(features[0].attributes["SYSTEM_TYPE"], "OSTDS");
    }

    #[test]
    fn dedupes_within_batch() {
        let conn = open_in_memory().unwrap();
        let stats = insert_features(
            &conn,
            &[feature("a", 27.0, -82.0), feature("a", 27.5, -82.5)],
        )
        .unwrap();

        assert_eq!(stats.written, 1);
        let features = load_features(&conn).unwrap();
        assert!((features[0].lat - 27.5).abs() < f64::EPSILON);
    }

    #[test]
    fn source_upsert_keeps_record_count() {
        let conn = open_in_memory().unwrap();
        upsert_source(&conn, &source()).unwrap();
        insert_features(&conn, &[feature("a", 27.9, -82.4), feature("b", 27.8, -82.3)]).unwrap();
        assert_eq!(refresh_record_count(&conn, "hillsborough_fl").unwrap(), 2);

        let mut renamed = source();
        renamed.name = "Renamed".to_string();
        upsert_source(&conn, &renamed).unwrap();

        let sources = load_sources(&conn).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "Renamed");
        assert_eq!(sources[0].record_count, 2);
        assert_eq!(sources[0].quality, SourceQuality::High);
        assert_eq!(sources[0].bbox, source().bbox);
    }

    #[test]
    fn missing_schema_is_distinguishable() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            load_features(&conn),
            Err(DbError::MissingSchema {
                table: FEATURES_TABLE
            })
        ));
        assert!(matches!(
            load_sources(&conn),
            Err(DbError::MissingSchema { .. })
        ));
    }

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "septic_locator_feature_db_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn open_existing_does_not_create_missing_store() {
        let dir = temp_dir("missing");
        let path = dir.join("typo.duckdb");

        assert!(matches!(open_existing(&path), Err(DbError::NotFound { .. })));
        assert!(matches!(open_read_only(&path), Err(DbError::NotFound { .. })));
        assert!(!path.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn read_only_handle_releases_store_for_writers() {
        let dir = temp_dir("read_only");
        let path = dir.join("septic.duckdb");
        {
            let conn = open(&path).unwrap();
            upsert_source(&conn, &source()).unwrap();
        }

        {
            let reader = open_read_only(&path).unwrap();
            assert_eq!(load_sources(&reader).unwrap().len(), 1);
            assert!(insert_features(&reader, &[feature("R1", 27.95, -82.45)]).is_err());
        }

        let writer = open(&path).unwrap();
        let stats = insert_features(&writer, &[feature("R1", 27.95, -82.45)]).unwrap();
        assert_eq!(stats.written, 1);
        drop(writer);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
