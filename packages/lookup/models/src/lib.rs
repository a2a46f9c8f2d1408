#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result types produced by a septic lookup.
//!
//! [`ClassificationResult`] is handed verbatim to the report layer, so its
//! JSON shape (camelCase keys, lowercase enum values) is part of the
//! external contract.

use septic_locator_septic_models::{LatLng, NearbyFeature, Source};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Best guess at how the property handles wastewater.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Classification {
    /// A septic record belongs to this property.
    Septic,
    /// A septic record is close enough that it may belong to this property
    /// or a neighbor.
    LikelySeptic,
    /// No septic record close enough to attribute to this property.
    Sewer,
    /// No data covers this location.
    Unknown,
}

/// How trustworthy a [`Classification`] is.
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
pub enum Confidence {
    /// Strong evidence.
    High,
    /// Likely but not certain.
    Medium,
    /// Weak evidence; manual verification recommended.
    Low,
}

/// Coarse failure risk derived from system age.
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
pub enum RiskLevel {
    /// 15 years old or younger.
    Low,
    /// Older than 15 years.
    Medium,
    /// Older than 25 years.
    High,
}

/// Provenance tier of the nearest record, detected from its attributes.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataQuality {
    /// The record carries a permit application number.
    VerifiedPermit,
    /// The record comes from a modeled inventory, not a permit.
    EstimatedInventory,
    /// No recognizable provenance markers.
    Unknown,
}

/// Canonical system info extracted from a feature's attribute bag.
///
/// Every field is optional; which ones are present depends on what the
/// source recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedAttributes {
    /// System type (e.g., "OSTDS Repair").
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub system_type: Option<String>,
    /// Permit number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permit_number: Option<String>,
    /// Permit or approval date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permit_date: Option<String>,
    /// Installation date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_date: Option<String>,
    /// Last pump-out or service date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_service_date: Option<String>,
    /// Derived age, formatted `"{n} years old"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_estimate: Option<String>,
    /// Design flow, formatted `"{n} GPD"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,
    /// Tank size range estimated from design flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_tank_size: Option<String>,
    /// Lot size, formatted `"{n} acres"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_size: Option<String>,
    /// Residential or commercial.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    /// Water supply type (well, community system, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_supply: Option<String>,
    /// Final system approval status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_status: Option<String>,
    /// Final inspection date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_inspection_date: Option<String>,
    /// Tax folio number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_folio: Option<String>,
    /// Address recorded on the system permit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_address: Option<String>,
}

/// Output of one septic lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    /// Whether any data source covers the query location.
    pub is_covered: bool,
    /// Septic/sewer determination.
    pub classification: Classification,
    /// Confidence in the determination.
    pub confidence: Confidence,
    /// Sources covering the query location.
    pub coverage_sources: Vec<Source>,
    /// Features within the search radius, nearest first.
    pub nearest_features: Vec<NearbyFeature>,
    /// Location of the nearest septic record.
    pub tank_point: Option<LatLng>,
    /// Normalized info from the nearest record.
    pub system_info: Option<NormalizedAttributes>,
    /// Risk derived from the system's age.
    pub risk_level: Option<RiskLevel>,
    /// Provenance tier of the nearest record.
    pub data_quality: DataQuality,
    /// Human-readable provenance of the nearest record.
    pub quality_source: String,
}

impl ClassificationResult {
    /// The result for a location no data source covers.
    #[must_use]
    pub fn not_covered() -> Self {
        Self {
            is_covered: false,
            classification: Classification::Unknown,
            confidence: Confidence::Low,
            coverage_sources: Vec::new(),
            nearest_features: Vec::new(),
            tank_point: None,
            system_info: None,
            risk_level: None,
            data_quality: DataQuality::Unknown,
            quality_source: "Unknown".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_contract_field_names() {
        let json = serde_json::to_value(ClassificationResult::not_covered()).unwrap();
        assert_eq!(json["isCovered"], false);
        assert_eq!(json["classification"], "unknown");
        assert_eq!(json["confidence"], "low");
        assert!(json["tankPoint"].is_null());
        assert!(json["systemInfo"].is_null());
        assert!(json["riskLevel"].is_null());
        assert_eq!(json["dataQuality"], "unknown");
    }

    #[test]
    fn likely_septic_uses_snake_case() {
        assert_eq!(Classification::LikelySeptic.to_string(), "likely_septic");
        assert_eq!(
            serde_json::to_value(Classification::LikelySeptic).unwrap(),
            "likely_septic"
        );
    }

    #[test]
    fn normalized_attributes_omit_missing_fields() {
        let attrs = NormalizedAttributes {
            system_type: Some("OSTDS".to_string()),
            permit_number: Some("X123".to_string()),
            ..NormalizedAttributes::default()
        };
        let json = serde_json::to_value(&attrs).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["type"], "OSTDS");
        assert_eq!(obj["permitNumber"], "X123");
    }
}
