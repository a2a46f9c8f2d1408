//! Distance-threshold classification.

use septic_locator_lookup_models::{Classification, Confidence};
use septic_locator_septic_models::NearbyFeature;

/// A septic record this close almost certainly belongs to the property.
pub const SEPTIC_HIGH_METERS: f64 = 15.0;

/// A septic record this close most likely belongs to the property.
pub const SEPTIC_MEDIUM_METERS: f64 = 50.0;

/// Beyond [`SEPTIC_MEDIUM_METERS`] but within this, the record may be a
/// neighbor's.
pub const LIKELY_SEPTIC_METERS: f64 = 200.0;

/// Classifies a covered location from the features found around it.
///
/// No features at all reads as sewer with medium confidence: the area has
/// data and none of it is near.
#[must_use]
pub fn classify(features: &[NearbyFeature]) -> (Classification, Confidence) {
    features
        .iter()
        .map(|f| f.distance_meters)
        .min_by(f64::total_cmp)
        .map_or((Classification::Sewer, Confidence::Medium), classify_distance)
}

/// Maps the distance to the nearest septic record onto a classification.
#[must_use]
pub fn classify_distance(distance_meters: f64) -> (Classification, Confidence) {
    if distance_meters < SEPTIC_HIGH_METERS {
        (Classification::Septic, Confidence::High)
    } else if distance_meters < SEPTIC_MEDIUM_METERS {
        (Classification::Septic, Confidence::Medium)
    } else if distance_meters < LIKELY_SEPTIC_METERS {
        (Classification::LikelySeptic, Confidence::Low)
    } else {
        (Classification::Sewer, Confidence::Low)
    }
}
