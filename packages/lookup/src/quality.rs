//! Provenance tier detection from raw feature attributes.

use septic_locator_lookup_models::DataQuality;

/// Quality label for records carrying a permit application number.
pub const PERMIT_RECORDS_LABEL: &str = "Florida DOH Permit Records";

/// Quality label for modeled inventory records.
pub const INVENTORY_LABEL: &str = "Florida DOH 2009-2015 Inventory";

/// Quality label when no provenance marker is present.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Detects how a record was produced from its attributes.
///
/// A permit application number (`APNO`) marks a verified permit; a
/// wastewater flag of `LikelySeptic` marks the modeled statewide
/// inventory.
#[must_use]
pub fn detect_data_quality(attributes: &serde_json::Value) -> (DataQuality, &'static str) {
    let has_permit = attributes.get("APNO").is_some_and(|v| match v {
        serde_json::Value::Null => false,
        serde_json::Value::String(s) => !s.trim().is_empty(),
        _ => true,
    });
    if has_permit {
        return (DataQuality::VerifiedPermit, PERMIT_RECORDS_LABEL);
    }

    if attributes.get("WW").and_then(serde_json::Value::as_str) == Some("LikelySeptic") {
        return (DataQuality::EstimatedInventory, INVENTORY_LABEL);
    }

    (DataQuality::Unknown, UNKNOWN_LABEL)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn permit_number_wins() {
        let (quality, label) = detect_data_quality(&json!({"APNO": "58-SC-123", "WW": "LikelySeptic"}));
        assert_eq!(quality, DataQuality::VerifiedPermit);
        assert_eq!(label, PERMIT_RECORDS_LABEL);
    }

    #[test]
    fn numeric_permit_number_counts() {
        assert_eq!(
            detect_data_quality(&json!({"APNO": 4411})).0,
            DataQuality::VerifiedPermit
        );
    }

    #[test]
    fn inventory_flag() {
        assert_eq!(
            detect_data_quality(&json!({"APNO": "  ", "WW": "LikelySeptic"})),
            (DataQuality::EstimatedInventory, INVENTORY_LABEL)
        );
    }

    #[test]
    fn unknown_otherwise() {
        assert_eq!(
            detect_data_quality(&json!({"WW": "KnownSewer"})),
            (DataQuality::Unknown, UNKNOWN_LABEL)
        );
        assert_eq!(detect_data_quality(&json!(null)).0, DataQuality::Unknown);
    }
}
