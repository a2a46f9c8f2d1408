#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the septic locator server.
//!
//! Lookups return [`ClassificationResult`](septic_locator_lookup_models::ClassificationResult)
//! as-is; the types here cover everything else the API accepts or emits.

use septic_locator_lookup_models::{Classification, Confidence};
use septic_locator_septic_models::{BoundingBox, GeometryType, Source, SourceQuality};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Error body returned with any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// What went wrong.
    pub error: String,
}

impl ApiError {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Query parameters for `GET /api/lookup`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupQueryParams {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Search radius in meters.
    #[serde(alias = "radiusMeters")]
    pub radius: Option<f64>,
    /// Address the caller geocoded, recorded in the lookup log.
    pub address: Option<String>,
}

/// JSON body for `POST /api/lookup`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Search radius in meters.
    #[serde(default, alias = "radius", skip_serializing_if = "Option::is_none")]
    pub radius_meters: Option<f64>,
    /// Address the caller geocoded, recorded in the lookup log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl From<LookupQueryParams> for LookupRequest {
    fn from(params: LookupQueryParams) -> Self {
        Self {
            lat: params.lat,
            lng: params.lng,
            radius_meters: params.radius,
            address: params.address,
        }
    }
}

/// Query parameters for `GET /api/coverage`.
#[derive(Debug, Clone, Deserialize)]
pub struct CoverageQueryParams {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

/// A data source as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSource {
    /// Source ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// State abbreviation.
    pub state: String,
    /// County, for county-level datasets.
    pub county: Option<String>,
    /// Quality tier.
    pub quality: SourceQuality,
    /// Geometry type of the records.
    pub geometry_type: GeometryType,
    /// Records stored.
    pub record_count: u64,
    /// Coverage extent, when one is registered.
    pub bbox: Option<BoundingBox>,
}

impl From<Source> for ApiSource {
    fn from(source: Source) -> Self {
        Self {
            id: source.id,
            name: source.name,
            state: source.state,
            county: source.county,
            quality: source.quality,
            geometry_type: source.geometry_type,
            record_count: source.record_count,
            bbox: source.bbox,
        }
    }
}

/// Response for `GET /api/coverage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCoverage {
    /// Whether any data source covers the location.
    pub is_covered: bool,
    /// The covering sources.
    pub sources: Vec<ApiSource>,
    /// Classification at the default radius.
    pub classification: Classification,
    /// Confidence in the classification.
    pub confidence: Confidence,
}

/// Response for `POST /api/admin/reload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReload {
    /// Features indexed after the reload.
    pub feature_count: usize,
    /// Sources registered after the reload.
    pub source_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_request_accepts_either_radius_name() {
        let a: LookupRequest =
            serde_json::from_str(r#"{"lat": 27.9, "lng": -82.4, "radiusMeters": 150}"#).unwrap();
        let b: LookupRequest =
            serde_json::from_str(r#"{"lat": 27.9, "lng": -82.4, "radius": 150}"#).unwrap();
        assert_eq!(a.radius_meters, Some(150.0));
        assert_eq!(b.radius_meters, Some(150.0));
    }

    #[test]
    fn source_serializes_camel_case() {
        let source = ApiSource::from(Source {
            id: "fl".to_string(),
            name: "Florida".to_string(),
            state: "FL".to_string(),
            county: None,
            quality: SourceQuality::High,
            geometry_type: GeometryType::Polygon,
            record_count: 12,
            bbox: None,
        });
        let json = serde_json::to_value(source).unwrap();
        assert_eq!(json["recordCount"], 12);
        assert_eq!(json["geometryType"], "POLYGON");
        assert_eq!(json["quality"], "high");
    }
}
