#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Septic feature and data source types.
//!
//! A [`Feature`] is one government record of a septic system (a permit, an
//! inventory point, or the centroid of a parcel polygon). A [`Source`]
//! describes the dataset a feature was imported from and the area it
//! covers. Both are written by the import tooling and read-only to the
//! classification engine.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude in degrees, `[-90, 90]`.
    pub lat: f64,
    /// Longitude in degrees, `[-180, 180]`.
    pub lng: f64,
}

impl LatLng {
    /// Creates a coordinate pair without validating it.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Creates a coordinate pair, rejecting anything outside WGS84 bounds.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCoordinateError`] if either component is not finite
    /// or out of range.
    pub fn try_new(lat: f64, lng: f64) -> Result<Self, InvalidCoordinateError> {
        if is_valid_wgs84(lat, lng) {
            Ok(Self { lat, lng })
        } else {
            Err(InvalidCoordinateError { lat, lng })
        }
    }

    /// Whether this pair lies within WGS84 bounds.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_valid_wgs84(self.lat, self.lng)
    }
}

/// Returns `true` when `lat` is in `[-90, 90]` and `lng` is in
/// `[-180, 180]`, both finite.
#[must_use]
pub fn is_valid_wgs84(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}

/// Error returned for coordinates outside WGS84 bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidCoordinateError {
    /// The rejected latitude.
    pub lat: f64,
    /// The rejected longitude.
    pub lng: f64,
}

impl std::fmt::Display for InvalidCoordinateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid WGS84 coordinate ({}, {}): expected lat in [-90, 90] and lng in [-180, 180]",
            self.lat, self.lng
        )
    }
}

impl std::error::Error for InvalidCoordinateError {}

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Whether the point lies inside (or on the edge of) the box.
    #[must_use]
    pub fn contains(&self, point: LatLng) -> bool {
        point.lng >= self.west
            && point.lng <= self.east
            && point.lat >= self.south
            && point.lat <= self.north
    }
}

/// Quality tier of a data source.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceQuality {
    /// Surveyed permit points or parcel-level records.
    High,
    /// Inventories with approximate locations.
    Medium,
    /// Estimates or coarse aggregates.
    Low,
}

/// Geometry type of the records in a data source.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GeometryType {
    /// Records are points.
    Point,
    /// Records are polygons, stored as centroids.
    Polygon,
}

/// Metadata describing one ingested government dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Unique identifier (e.g., `"fl_doh_ostds"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Two-letter state abbreviation.
    pub state: String,
    /// County name, or `None` for statewide datasets.
    pub county: Option<String>,
    /// Quality tier.
    pub quality: SourceQuality,
    /// Geometry type of the original records.
    pub geometry_type: GeometryType,
    /// Number of features imported from this source.
    pub record_count: u64,
    /// Explicit coverage extent. When absent the extent is derived from the
    /// source's features.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

/// One government-sourced septic record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Store-assigned primary key.
    pub id: i64,
    /// The [`Source`] this record was imported from.
    pub source_id: String,
    /// Identifier of the record within its source (unique per source).
    pub record_id: String,
    /// County name.
    pub county: String,
    /// Two-letter state abbreviation.
    pub state: String,
    /// Parcel identifier, if the source has one.
    pub parcel_id: Option<String>,
    /// Street address, if the source has one.
    pub address: Option<String>,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
    /// Whether the point is the centroid of a source polygon.
    pub centroid_derived: bool,
    /// Raw source attributes. Keys vary per source.
    pub attributes: serde_json::Value,
    /// Provenance tag of the ingestion pipeline.
    pub data_source: String,
}

impl Feature {
    /// The feature's location.
    #[must_use]
    pub const fn location(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

/// A [`Feature`] annotated with its geodesic distance from a query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyFeature {
    /// The matched feature.
    #[serde(flatten)]
    pub feature: Feature,
    /// Distance from the query point in meters.
    pub distance_meters: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_wgs84_bounds() {
        assert!(is_valid_wgs84(90.0, 180.0));
        assert!(is_valid_wgs84(-90.0, -180.0));
        assert!(is_valid_wgs84(27.95, -82.45));
    }

    #[test]
    fn rejects_out_of_range_and_non_finite() {
        assert!(!is_valid_wgs84(90.01, 0.0));
        assert!(!is_valid_wgs84(0.0, -180.5));
        assert!(!is_valid_wgs84(f64::NAN, 0.0));
        assert!(!is_valid_wgs84(0.0, f64::INFINITY));
        // State-plane feet mistaken for degrees
        assert!(LatLng::try_new(1_234_567.0, 456_789.0).is_err());
    }

    #[test]
    fn quality_round_trips_through_strings() {
        assert_eq!(SourceQuality::High.to_string(), "high");
        assert_eq!("medium".parse::<SourceQuality>().unwrap(), SourceQuality::Medium);
        assert_eq!(GeometryType::Polygon.as_ref(), "POLYGON");
        assert_eq!("POINT".parse::<GeometryType>().unwrap(), GeometryType::Point);
    }

    #[test]
    fn nearby_feature_flattens_with_distance() {
        let nearby = NearbyFeature {
            feature: Feature {
                id: 7,
                source_id: "fl_doh".to_string(),
                record_id: "AP1267843".to_string(),
                county: "Hillsborough".to_string(),
                state: "FL".to_string(),
                parcel_id: None,
                address: Some("100 MAIN ST".to_string()),
                lat: 27.95,
                lng: -82.45,
                centroid_derived: false,
                attributes: serde_json::json!({"APNO": "AP1267843"}),
                data_source: "fl_doh_2024".to_string(),
            },
            distance_meters: 12.5,
        };

        let json = serde_json::to_value(&nearby).unwrap();
        assert_eq!(json["distance_meters"], 12.5);
        assert_eq!(json["county"], "Hillsborough");
        assert_eq!(json["attributes"]["APNO"], "AP1267843");
    }

    #[test]
    fn bbox_contains_edges() {
        let bbox = BoundingBox::new(-83.0, 27.0, -82.0, 28.0);
        assert!(bbox.contains(LatLng::new(27.0, -83.0)));
        assert!(bbox.contains(LatLng::new(27.5, -82.5)));
        assert!(!bbox.contains(LatLng::new(28.1, -82.5)));
    }
}
