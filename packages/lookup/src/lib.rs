#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Septic/sewer classification engine.
//!
//! [`SepticLookup::lookup`] takes a WGS84 point and answers whether the
//! property is on septic or sewer:
//!
//! 1. check that some data source covers the point,
//! 2. find septic records within the search radius,
//! 3. classify from the distance to the nearest one,
//! 4. normalize that record's attributes and estimate failure risk.
//!
//! Store failures never surface to the caller. They are logged and the
//! lookup degrades to "not covered" or "no features found".

pub mod classify;
pub mod config;
pub mod coverage;
pub mod normalize;
pub mod quality;
pub mod risk;
pub mod store;

use std::sync::Arc;

use chrono::{Datelike as _, Utc};
use septic_locator_lookup_models::{ClassificationResult, DataQuality};
use septic_locator_septic_models::{LatLng, NearbyFeature, Source};

pub use config::LookupConfig;
pub use store::{FeatureStore, IndexedStore, ReloadStats, StoreError};

use crate::store::{report_store_error, with_timeout};

/// The classification engine.
#[derive(Clone)]
pub struct SepticLookup {
    store: Arc<dyn FeatureStore>,
    config: LookupConfig,
}

impl SepticLookup {
    #[must_use]
    pub fn new(store: Arc<dyn FeatureStore>, config: LookupConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub const fn config(&self) -> &LookupConfig {
        &self.config
    }

    /// Sources covering `point`. Empty when nothing does or the store
    /// failed.
    pub async fn check_coverage(&self, point: LatLng) -> Vec<Source> {
        coverage::check_coverage(self.store.as_ref(), point, &self.config).await
    }

    /// Features within `radius_meters` of `point`, nearest first. Empty
    /// when nothing is in range or the store failed.
    pub async fn find_nearest(&self, point: LatLng, radius_meters: f64) -> Vec<NearbyFeature> {
        with_timeout(
            self.config.query_timeout,
            "Nearest-feature query",
            self.store.find_nearest(point, radius_meters),
        )
        .await
        .unwrap_or_else(|e| {
            report_store_error("Nearest-feature query", &e);
            Vec::new()
        })
    }

    /// Every registered source, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be queried or times out.
    pub async fn sources(&self) -> Result<Vec<Source>, StoreError> {
        with_timeout(self.config.query_timeout, "Source listing", self.store.sources()).await
    }

    /// Classifies `point`, searching `radius_meters` (or the configured
    /// default) for septic records.
    pub async fn lookup(&self, point: LatLng, radius_meters: Option<f64>) -> ClassificationResult {
        self.lookup_at(point, radius_meters, Utc::now().year()).await
    }

    /// [`lookup`](Self::lookup) with the age estimate computed against
    /// `current_year`.
    pub async fn lookup_at(
        &self,
        point: LatLng,
        radius_meters: Option<f64>,
        current_year: i32,
    ) -> ClassificationResult {
        if !point.is_valid() {
            log::warn!(
                "Lookup rejected invalid coordinates ({}, {})",
                point.lat,
                point.lng
            );
            return ClassificationResult::not_covered();
        }

        let radius = match radius_meters {
            Some(r) if r.is_finite() && r > 0.0 => r,
            Some(r) => {
                log::warn!(
                    "Ignoring invalid radius {r}; using {}m",
                    self.config.default_radius_meters
                );
                self.config.default_radius_meters
            }
            None => self.config.default_radius_meters,
        };

        let coverage_sources = self.check_coverage(point).await;
        if coverage_sources.is_empty() {
            log::info!("Lookup ({}, {}): not covered", point.lat, point.lng);
            return ClassificationResult::not_covered();
        }

        let features = self.find_nearest(point, radius).await;
        let (classification, confidence) = classify::classify(&features);

        let nearest = features.first();
        let system_info = nearest
            .and_then(|n| normalize::normalize_at(&n.feature.attributes, current_year));
        let risk_level = system_info.as_ref().and_then(risk::estimate_risk);
        let (data_quality, quality_source) =
            nearest.map_or((DataQuality::Unknown, quality::UNKNOWN_LABEL), |n| {
                quality::detect_data_quality(&n.feature.attributes)
            });

        log::info!(
            "Lookup ({}, {}): {classification}/{confidence}, {} features within {radius}m, nearest {}",
            point.lat,
            point.lng,
            features.len(),
            nearest.map_or_else(
                || "none".to_string(),
                |n| format!("{:.1}m", n.distance_meters)
            ),
        );

        ClassificationResult {
            is_covered: true,
            classification,
            confidence,
            coverage_sources,
            tank_point: nearest.map(|n| n.feature.location()),
            system_info,
            risk_level,
            data_quality,
            quality_source: quality_source.to_string(),
            nearest_features: features,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use async_trait::async_trait;
    use septic_locator_septic_models::{
        BoundingBox, Feature, GeometryType, LatLng, NearbyFeature, Source, SourceQuality,
    };

    use crate::{FeatureStore, StoreError};

    pub fn source_with_bbox(id: &str, west: f64, south: f64, east: f64, north: f64) -> Source {
        Source {
            id: id.to_string(),
            name: format!("{id} septic permits"),
            state: "FL".to_string(),
            county: Some("Hillsborough".to_string()),
            quality: SourceQuality::High,
            geometry_type: GeometryType::Point,
            record_count: 0,
            bbox: Some(BoundingBox::new(west, south, east, north)),
        }
    }

    pub fn nearby(id: i64, county: &str, state: &str, distance_meters: f64) -> NearbyFeature {
        nearby_with(id, county, state, distance_meters, serde_json::json!({}))
    }

    pub fn nearby_with(
        id: i64,
        county: &str,
        state: &str,
        distance_meters: f64,
        attributes: serde_json::Value,
    ) -> NearbyFeature {
        NearbyFeature {
            feature: Feature {
                id,
                source_id: "test".to_string(),
                record_id: id.to_string(),
                county: county.to_string(),
                state: state.to_string(),
                parcel_id: None,
                address: None,
                lat: 27.95,
                lng: -82.45,
                centroid_derived: false,
                attributes,
                data_source: "test".to_string(),
            },
            distance_meters,
        }
    }

    enum Mode {
        Ok,
        Failing,
        Slow(Duration),
    }

    /// Store double with precomputed distances.
    pub struct MemoryStore {
        sources: Vec<Source>,
        features: Vec<NearbyFeature>,
        mode: Mode,
    }

    impl MemoryStore {
        pub fn new(sources: Vec<Source>, features: Vec<NearbyFeature>) -> Self {
            Self {
                sources,
                features,
                mode: Mode::Ok,
            }
        }

        pub fn failing() -> Self {
            Self {
                sources: Vec::new(),
                features: Vec::new(),
                mode: Mode::Failing,
            }
        }

        pub fn slow(delay: Duration, sources: Vec<Source>, features: Vec<NearbyFeature>) -> Self {
            Self {
                sources,
                features,
                mode: Mode::Slow(delay),
            }
        }

        async fn gate(&self) -> Result<(), StoreError> {
            match self.mode {
                Mode::Ok => Ok(()),
                Mode::Failing => Err(StoreError::Unavailable {
                    message: "connection refused".to_string(),
                }),
                Mode::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(())
                }
            }
        }
    }

    #[async_trait]
    impl FeatureStore for MemoryStore {
        async fn covering_sources(&self, point: LatLng) -> Result<Vec<Source>, StoreError> {
            self.gate().await?;
            Ok(self
                .sources
                .iter()
                .filter(|s| s.bbox.is_some_and(|b| b.contains(point)))
                .cloned()
                .collect())
        }

        async fn find_nearest(
            &self,
            _point: LatLng,
            radius_meters: f64,
        ) -> Result<Vec<NearbyFeature>, StoreError> {
            self.gate().await?;
            let mut hits: Vec<NearbyFeature> = self
                .features
                .iter()
                .filter(|f| f.distance_meters <= radius_meters)
                .cloned()
                .collect();
            hits.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
            Ok(hits)
        }

        async fn sources(&self) -> Result<Vec<Source>, StoreError> {
            self.gate().await?;
            Ok(self.sources.clone())
        }
    }
}
