#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial indexes for septic lookups.
//!
//! [`FeatureIndex`] holds every septic feature in an R-tree keyed by
//! `[lng, lat]`. Radius queries first collect candidates from a
//! degree-space envelope that bounds the search circle, then keep only
//! those whose Haversine distance is within the radius. [`CoverageIndex`]
//! holds one envelope per data source for point-in-extent coverage checks.

mod coverage;

pub use coverage::CoverageIndex;

use std::collections::{BTreeMap, BTreeSet};

use geo::{Distance, Haversine, Point};
use rstar::{AABB, RTree, RTreeObject};
use septic_locator_septic_models::{BoundingBox, Feature, LatLng, NearbyFeature};

/// Meters per degree of arc on the mean Earth radius used by Haversine.
const METERS_PER_DEGREE: f64 = 111_195.08;

/// Padding applied to degree-space envelopes so candidate collection never
/// misses a point the exact distance check would accept.
const ENVELOPE_PAD: f64 = 1.05;

/// A feature stored in the R-tree.
struct FeatureEntry {
    position: [f64; 2],
    feature: Feature,
}

impl RTreeObject for FeatureEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// R-tree over septic features for nearest-within-radius queries.
pub struct FeatureIndex {
    tree: RTree<FeatureEntry>,
}

impl FeatureIndex {
    /// Builds the index, skipping any feature outside WGS84 bounds.
    #[must_use]
    pub fn build(features: Vec<Feature>) -> Self {
        let total = features.len();
        let entries: Vec<FeatureEntry> = features
            .into_iter()
            .filter(|f| f.location().is_valid())
            .map(|feature| FeatureEntry {
                position: [feature.lng, feature.lat],
                feature,
            })
            .collect();

        let skipped = total - entries.len();
        if skipped > 0 {
            log::warn!("Skipped {skipped} features with invalid coordinates while building index");
        }

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// An index with no features.
    #[must_use]
    pub fn empty() -> Self {
        Self { tree: RTree::new() }
    }

    /// Number of indexed features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index holds no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Returns every feature within `radius_meters` of `center`, nearest
    /// first, each annotated with its Haversine distance.
    ///
    /// Ties are broken by feature ID. Invalid coordinates or a negative or
    /// non-finite radius yield an empty list.
    #[must_use]
    pub fn find_nearest(&self, center: LatLng, radius_meters: f64) -> Vec<NearbyFeature> {
        if !center.is_valid() || !radius_meters.is_finite() || radius_meters < 0.0 {
            return Vec::new();
        }

        let origin = Point::new(center.lng, center.lat);
        let mut seen = BTreeSet::new();
        let mut hits = Vec::new();

        for envelope in search_envelopes(center, radius_meters) {
            for entry in self.tree.locate_in_envelope_intersecting(&envelope) {
                if !seen.insert(entry.feature.id) {
                    continue;
                }
                let distance =
                    Haversine.distance(origin, Point::new(entry.position[0], entry.position[1]));
                if distance <= radius_meters {
                    hits.push(NearbyFeature {
                        feature: entry.feature.clone(),
                        distance_meters: distance,
                    });
                }
            }
        }

        hits.sort_by(|a, b| {
            a.distance_meters
                .total_cmp(&b.distance_meters)
                .then(a.feature.id.cmp(&b.feature.id))
        });
        hits
    }

    /// Bounding box of each source's features, keyed by source ID.
    #[must_use]
    pub fn extents_by_source(&self) -> BTreeMap<String, BoundingBox> {
        let mut extents: BTreeMap<String, BoundingBox> = BTreeMap::new();

        for entry in self.tree.iter() {
            let [lng, lat] = entry.position;
            extents
                .entry(entry.feature.source_id.clone())
                .and_modify(|b| {
                    b.west = b.west.min(lng);
                    b.east = b.east.max(lng);
                    b.south = b.south.min(lat);
                    b.north = b.north.max(lat);
                })
                .or_insert_with(|| BoundingBox::new(lng, lat, lng, lat));
        }

        extents
    }
}

/// Degree-space envelopes that together contain every point within
/// `radius_meters` of `center`.
///
/// Returns one envelope normally, two when the circle crosses the
/// antimeridian, and a full-longitude band when it reaches a pole.
#[must_use]
pub fn search_envelopes(center: LatLng, radius_meters: f64) -> Vec<AABB<[f64; 2]>> {
    let dlat = radius_meters / METERS_PER_DEGREE * ENVELOPE_PAD;
    let south = (center.lat - dlat).max(-90.0);
    let north = (center.lat + dlat).min(90.0);

    let Some(dlng) = longitude_span(radius_meters, south, north) else {
        return vec![AABB::from_corners([-180.0, south], [180.0, north])];
    };

    let west = center.lng - dlng;
    let east = center.lng + dlng;
    let mut envelopes = vec![AABB::from_corners(
        [west.max(-180.0), south],
        [east.min(180.0), north],
    )];

    if west < -180.0 {
        envelopes.push(AABB::from_corners([west + 360.0, south], [180.0, north]));
    }
    if east > 180.0 {
        envelopes.push(AABB::from_corners([-180.0, south], [east - 360.0, north]));
    }

    envelopes
}

/// Grows a bounding box by `margin_meters` on every side.
#[must_use]
pub fn expand_bbox(bbox: BoundingBox, margin_meters: f64) -> BoundingBox {
    let dlat = margin_meters / METERS_PER_DEGREE * ENVELOPE_PAD;
    let south = (bbox.south - dlat).max(-90.0);
    let north = (bbox.north + dlat).min(90.0);

    longitude_span(margin_meters, south, north).map_or(
        BoundingBox::new(-180.0, south, 180.0, north),
        |dlng| {
            BoundingBox::new(
                (bbox.west - dlng).max(-180.0),
                south,
                (bbox.east + dlng).min(180.0),
                north,
            )
        },
    )
}

/// Longitude half-width in degrees covering `meters` anywhere between
/// `south` and `north`. `None` when the band is too close to a pole for a
/// bounded span.
fn longitude_span(meters: f64, south: f64, north: f64) -> Option<f64> {
    let widest = south.abs().max(north.abs());
    let cos = widest.to_radians().cos();
    if cos <= 1e-9 {
        return None;
    }
    let dlng = meters / (METERS_PER_DEGREE * cos) * ENVELOPE_PAD;
    (dlng < 180.0).then_some(dlng)
}

#[cfg(test)]
pub(crate) mod test_support {
    use septic_locator_septic_models::{Feature, LatLng};

    const EARTH_RADIUS_M: f64 = 6_371_008.8;

    /// A point `meters` due north of `origin`.
    pub fn north_of(origin: LatLng, meters: f64) -> LatLng {
        LatLng::new(origin.lat + (meters / EARTH_RADIUS_M).to_degrees(), origin.lng)
    }

    pub fn feature(id: i64, source_id: &str, at: LatLng) -> Feature {
        Feature {
            id,
            source_id: source_id.to_string(),
            record_id: format!("rec-{id}"),
            county: "Hillsborough".to_string(),
            state: "FL".to_string(),
            parcel_id: None,
            address: None,
            lat: at.lat,
            lng: at.lng,
            centroid_derived: false,
            attributes: serde_json::json!({}),
            data_source: "test".to_string(),
        }
    }
}
