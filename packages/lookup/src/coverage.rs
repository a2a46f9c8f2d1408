//! Coverage check: does any dataset speak for this location?
//!
//! Registered source extents are consulted first. When none match, the
//! features within the fallback radius are grouped by county and state and
//! each group becomes a synthetic source. This keeps data imported without
//! a registered source usable.

use std::collections::BTreeMap;

use septic_locator_septic_models::{GeometryType, LatLng, NearbyFeature, Source, SourceQuality};

use crate::{
    LookupConfig,
    store::{FeatureStore, report_store_error, with_timeout},
};

/// Returns the sources covering `point`, or an empty list when nothing
/// does or the store cannot answer.
pub async fn check_coverage(
    store: &dyn FeatureStore,
    point: LatLng,
    config: &LookupConfig,
) -> Vec<Source> {
    match with_timeout(
        config.query_timeout,
        "Coverage query",
        store.covering_sources(point),
    )
    .await
    {
        Ok(sources) if !sources.is_empty() => {
            log::debug!(
                "Point ({}, {}) covered by {} registered sources",
                point.lat,
                point.lng,
                sources.len()
            );
            return sources;
        }
        Ok(_) => {}
        Err(e) => report_store_error("Coverage query", &e),
    }

    match with_timeout(
        config.query_timeout,
        "Fallback coverage query",
        store.find_nearest(point, config.coverage_fallback_radius_meters),
    )
    .await
    {
        Ok(features) => {
            let sources = synthesize_sources(&features);
            if !sources.is_empty() {
                log::info!(
                    "Point ({}, {}) covered via fallback: {} features within {}m",
                    point.lat,
                    point.lng,
                    features.len(),
                    config.coverage_fallback_radius_meters
                );
            }
            sources
        }
        Err(e) => {
            report_store_error("Fallback coverage query", &e);
            Vec::new()
        }
    }
}

/// One synthetic source per distinct county and state among `features`,
/// ordered by state then county.
#[must_use]
pub fn synthesize_sources(features: &[NearbyFeature]) -> Vec<Source> {
    let mut groups: BTreeMap<(&str, &str), u64> = BTreeMap::new();
    for nearby in features {
        *groups
            .entry((nearby.feature.state.as_str(), nearby.feature.county.as_str()))
            .or_default() += 1;
    }

    groups
        .into_iter()
        .map(|((state, county), record_count)| Source {
            id: format!("synthetic-{county}-{state}"),
            name: format!("{county} County Septic Records"),
            state: state.to_string(),
            county: Some(county.to_string()),
            quality: SourceQuality::High,
            geometry_type: GeometryType::Point,
            record_count,
            bbox: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::test_support::{MemoryStore, nearby, source_with_bbox};

    use super::*;

    const TAMPA: LatLng = LatLng::new(27.9506, -82.4572);

    #[tokio::test]
    async fn registered_source_wins() {
        let store = MemoryStore::new(
            vec![source_with_bbox("hillsborough", -82.8, 27.6, -82.0, 28.2)],
            vec![nearby(1, "Hillsborough", "FL", 10.0)],
        );
        let sources = check_coverage(&store, TAMPA, &LookupConfig::default()).await;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id, "hillsborough");
    }

    #[tokio::test]
    async fn falls_back_to_nearby_features() {
        let store = MemoryStore::new(
            vec![],
            vec![
                nearby(1, "Hillsborough", "FL", 800.0),
                nearby(2, "Hillsborough", "FL", 1_500.0),
                nearby(3, "Pasco", "FL", 4_000.0),
            ],
        );
        let sources = check_coverage(&store, TAMPA, &LookupConfig::default()).await;

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].id, "synthetic-Hillsborough-FL");
        assert_eq!(sources[0].name, "Hillsborough County Septic Records");
        assert_eq!(sources[0].record_count, 2);
        assert_eq!(sources[0].quality, SourceQuality::High);
        assert_eq!(sources[1].id, "synthetic-Pasco-FL");
        assert_eq!(sources[1].record_count, 1);
    }

    #[tokio::test]
    async fn nothing_nearby_means_not_covered() {
        let store = MemoryStore::new(vec![], vec![nearby(1, "Hillsborough", "FL", 6_000.0)]);
        assert!(
            check_coverage(&store, TAMPA, &LookupConfig::default())
                .await
                .is_empty()
        );
    }

    #[tokio::test]
    async fn store_failure_means_not_covered() {
        let store = MemoryStore::failing();
        assert!(
            check_coverage(&store, TAMPA, &LookupConfig::default())
                .await
                .is_empty()
        );
    }

    #[test]
    fn synthesizes_nothing_from_nothing() {
        assert!(synthesize_sources(&[]).is_empty());
    }
}
