//! Source coverage extents.
//!
//! Each registered source gets one envelope: its explicit `bbox` when the
//! seed provides one, otherwise the bounding box of its features grown by a
//! margin so properties just outside the outermost record still count as
//! covered.

use rstar::{AABB, RTree, RTreeObject};
use septic_locator_septic_models::{BoundingBox, LatLng, Source};

use crate::{FeatureIndex, expand_bbox};

struct CoverageEntry {
    source: Source,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for CoverageEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree of source coverage extents.
pub struct CoverageIndex {
    tree: RTree<CoverageEntry>,
    registered: Vec<Source>,
}

impl CoverageIndex {
    /// Builds the coverage index for `sources`.
    ///
    /// Sources with neither an explicit extent nor any indexed features
    /// are logged and left out; they can never match a point.
    #[must_use]
    pub fn build(sources: Vec<Source>, features: &FeatureIndex, margin_meters: f64) -> Self {
        let mut registered = sources;
        registered.sort_by(|a, b| a.id.cmp(&b.id));
        let derived = features.extents_by_source();
        let mut entries = Vec::with_capacity(registered.len());

        for source in &registered {
            let extent = source.bbox.or_else(|| {
                derived
                    .get(&source.id)
                    .map(|bbox| expand_bbox(*bbox, margin_meters))
            });

            let Some(extent) = extent else {
                log::warn!(
                    "Source {} has no bbox and no features; it cannot cover any location",
                    source.id
                );
                continue;
            };

            entries.push(CoverageEntry {
                envelope: to_envelope(extent),
                source: source.clone(),
            });
        }

        log::info!(
            "Coverage index: {} of {} sources have an extent",
            entries.len(),
            registered.len()
        );

        Self {
            tree: RTree::bulk_load(entries),
            registered,
        }
    }

    /// An index with no sources.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            tree: RTree::new(),
            registered: Vec::new(),
        }
    }

    /// Number of sources registered, including those without an extent.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.registered.len()
    }

    /// Sources whose extent contains `point`, ordered by ID.
    #[must_use]
    pub fn covering(&self, point: LatLng) -> Vec<Source> {
        if !point.is_valid() {
            return Vec::new();
        }

        let query = AABB::from_point([point.lng, point.lat]);
        let mut sources: Vec<Source> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .map(|entry| entry.source.clone())
            .collect();
        sources.sort_by(|a, b| a.id.cmp(&b.id));
        sources
    }

    /// Every registered source, ordered by ID, whether or not it has an
    /// extent yet.
    #[must_use]
    pub fn sources(&self) -> Vec<Source> {
        self.registered.clone()
    }
}

fn to_envelope(bbox: BoundingBox) -> AABB<[f64; 2]> {
    AABB::from_corners([bbox.west, bbox.south], [bbox.east, bbox.north])
}
