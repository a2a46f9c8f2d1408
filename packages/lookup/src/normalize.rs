//! Maps heterogeneous source attribute bags onto [`NormalizedAttributes`].
//!
//! Every county publishes its septic data with its own column names. The
//! alias table in `aliases.toml` lists, per canonical field, the names seen
//! so far in priority order.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike as _, NaiveDate, NaiveDateTime, Utc};
use septic_locator_lookup_models::NormalizedAttributes;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Ordered attribute names per canonical field.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldAliases {
    pub system_type: Vec<String>,
    pub permit_number: Vec<String>,
    pub permit_date: Vec<String>,
    pub install_date: Vec<String>,
    pub last_service_date: Vec<String>,
    pub capacity_gpd: Vec<String>,
    pub lot_size_acres: Vec<String>,
    pub property_type: Vec<String>,
    pub water_supply: Vec<String>,
    pub approval_status: Vec<String>,
    pub final_inspection_date: Vec<String>,
    pub tax_folio: Vec<String>,
    pub system_address: Vec<String>,
}

/// Embedded alias table.
///
/// # Panics
///
/// Dereferencing panics if `aliases.toml` fails to parse. The file is a
/// compile-time constant, so a failure is a development error and is
/// caught by the tests below.
pub static ALIASES: LazyLock<FieldAliases> = LazyLock::new(|| {
    toml::de::from_str(include_str!("../aliases.toml"))
        .unwrap_or_else(|e| panic!("Failed to parse attribute alias table: {e}"))
});

/// Values at or above this are treated as epoch milliseconds rather than
/// years or day counts.
const MIN_EPOCH_MILLIS: i64 = 100_000_000_000;

/// Normalizes `attributes` using the current UTC year for the age estimate.
#[must_use]
pub fn normalize(attributes: &Value) -> Option<NormalizedAttributes> {
    normalize_at(attributes, Utc::now().year())
}

/// Normalizes `attributes`, deriving the age estimate against
/// `current_year`.
///
/// Returns `None` when `attributes` is not an object or none of the
/// canonical fields are present.
#[must_use]
pub fn normalize_at(attributes: &Value, current_year: i32) -> Option<NormalizedAttributes> {
    let attrs = attributes.as_object()?;
    let aliases = &*ALIASES;

    let capacity = first_value(attrs, &aliases.capacity_gpd);

    let mut info = NormalizedAttributes {
        system_type: first_value(attrs, &aliases.system_type).map(plain_text),
        permit_number: first_value(attrs, &aliases.permit_number).map(plain_text),
        permit_date: first_value(attrs, &aliases.permit_date).map(date_text),
        install_date: first_value(attrs, &aliases.install_date).map(date_text),
        last_service_date: first_value(attrs, &aliases.last_service_date).map(date_text),
        age_estimate: None,
        capacity: capacity.map(|v| format!("{} GPD", plain_text(v))),
        estimated_tank_size: capacity.and_then(as_number).map(tank_size_for_flow),
        lot_size: first_value(attrs, &aliases.lot_size_acres)
            .map(|v| format!("{} acres", plain_text(v))),
        property_type: first_value(attrs, &aliases.property_type).map(plain_text),
        water_supply: first_value(attrs, &aliases.water_supply).map(plain_text),
        approval_status: first_value(attrs, &aliases.approval_status).map(plain_text),
        final_inspection_date: first_value(attrs, &aliases.final_inspection_date)
            .map(date_text),
        tax_folio: first_value(attrs, &aliases.tax_folio).map(plain_text),
        system_address: first_value(attrs, &aliases.system_address).map(plain_text),
    };

    info.age_estimate = info
        .permit_date
        .as_deref()
        .or(info.install_date.as_deref())
        .and_then(year_of)
        .map(|year| current_year - year)
        .filter(|age| (1..100).contains(age))
        .map(|age| format!("{age} years old"));

    (info != NormalizedAttributes::default()).then_some(info)
}

/// Tank size range typically installed for a design flow in gallons per
/// day.
#[must_use]
pub fn tank_size_for_flow(gallons_per_day: f64) -> String {
    let range = if gallons_per_day <= 200.0 {
        "750-1000 gallons"
    } else if gallons_per_day <= 300.0 {
        "1000-1250 gallons"
    } else if gallons_per_day <= 400.0 {
        "1250-1500 gallons"
    } else {
        "1500+ gallons"
    };
    range.to_string()
}

/// First alias holding a usable value: not null, not an empty or blank
/// string, and not a nested structure.
fn first_value<'a>(attrs: &'a Map<String, Value>, aliases: &[String]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| attrs.get(key))
        .find(|value| match value {
            Value::String(s) => !s.trim().is_empty(),
            Value::Number(_) | Value::Bool(_) => true,
            Value::Null | Value::Array(_) | Value::Object(_) => false,
        })
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Renders a date-like value. Epoch milliseconds become `YYYY-MM-DD`;
/// everything else is kept as written.
fn date_text(value: &Value) -> String {
    if let Some(millis) = epoch_millis(value).filter(|ms| ms.abs() >= MIN_EPOCH_MILLIS)
        && let Some(date) = DateTime::from_timestamp_millis(millis)
    {
        return date.format("%Y-%m-%d").to_string();
    }
    plain_text(value)
}

/// Integral JSON numbers, including float-typed ones like `1087257600000.0`.
#[allow(clippy::cast_possible_truncation)]
fn epoch_millis(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e18)
            .map(|f| f as i64)
    })
}

/// Extracts the calendar year from a rendered date.
fn year_of(text: &str) -> Option<i32> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.year());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.year());
        }
    }
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%m-%d-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date.year());
        }
    }

    // Bare year, or a year-first prefix like "2010-05".
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    if digits.len() == 4 {
        return digits.parse().ok();
    }

    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn alias_table_parses() {
        assert_eq!(ALIASES.permit_number[0], "APNO");
        assert_eq!(ALIASES.system_type.last().map(String::as_str), Some("LANDUSE"));
    }

    #[test]
    fn only_present_fields_are_set() {
        let info = normalize_at(&json!({"PERMIT_NUMBER": "X123"}), 2026).unwrap();
        assert_eq!(
            info,
            NormalizedAttributes {
                permit_number: Some("X123".to_string()),
                ..NormalizedAttributes::default()
            }
        );
    }

    #[test]
    fn first_alias_wins() {
        let info = normalize_at(
            &json!({"PERMIT_NO": "second", "APNO": "first", "SYSTEM_TYPE": "Aerobic"}),
            2026,
        )
        .unwrap();
        assert_eq!(info.permit_number.as_deref(), Some("first"));
        assert_eq!(info.system_type.as_deref(), Some("Aerobic"));
    }

    #[test]
    fn blank_values_fall_through() {
        let info = normalize_at(&json!({"APNO": "  ", "PERMIT_NO": "P-9"}), 2026).unwrap();
        assert_eq!(info.permit_number.as_deref(), Some("P-9"));
    }

    #[test]
    fn nothing_recognized_is_none() {
        assert_eq!(normalize_at(&json!({"FOO": 1, "BAR": "x"}), 2026), None);
        assert_eq!(normalize_at(&json!({}), 2026), None);
        assert_eq!(normalize_at(&json!("not an object"), 2026), None);
        assert_eq!(normalize_at(&Value::Null, 2026), None);
    }

    #[test]
    fn derives_age_from_permit_date() {
        let info = normalize_at(
            &json!({"SYSTTYPE": "OSTDS New", "APPRDATE": "2010-05-01"}),
            2026,
        )
        .unwrap();
        assert_eq!(info.permit_date.as_deref(), Some("2010-05-01"));
        assert_eq!(info.age_estimate.as_deref(), Some("16 years old"));
    }

    #[test]
    fn falls_back_to_install_date_for_age() {
        let info = normalize_at(&json!({"INSTALL_DATE": "03/15/1990"}), 2026).unwrap();
        assert_eq!(info.age_estimate.as_deref(), Some("36 years old"));
    }

    #[test]
    fn plain_year_is_kept() {
        let info = normalize_at(&json!({"ASMNT_YR": 2001}), 2026).unwrap();
        assert_eq!(info.permit_date.as_deref(), Some("2001"));
        assert_eq!(info.age_estimate.as_deref(), Some("25 years old"));
    }

    #[test]
    fn epoch_millis_render_as_date() {
        // 2004-06-15T00:00:00Z
        let info = normalize_at(&json!({"APPRDATE": 1_087_257_600_000_i64}), 2026).unwrap();
        assert_eq!(info.permit_date.as_deref(), Some("2004-06-15"));
        assert_eq!(info.age_estimate.as_deref(), Some("22 years old"));
    }

    #[test]
    fn float_typed_epoch_millis_render_as_date() {
        let info = normalize_at(&json!({"APPRDATE": 1_087_257_600_000.0_f64}), 2026).unwrap();
        assert_eq!(info.permit_date.as_deref(), Some("2004-06-15"));
        assert_eq!(info.age_estimate.as_deref(), Some("22 years old"));
        assert_eq!(
            crate::risk::estimate_risk(&info),
            Some(septic_locator_lookup_models::RiskLevel::Medium)
        );

        let fractional = normalize_at(&json!({"APPRDATE": 1_087_257_600_000.5_f64}), 2026).unwrap();
        assert_eq!(fractional.age_estimate, None);
    }

    #[test]
    fn implausible_ages_are_dropped() {
        let future = normalize_at(&json!({"PERMIT_DATE": "2030-01-01"}), 2026).unwrap();
        assert_eq!(future.age_estimate, None);
        let same_year = normalize_at(&json!({"PERMIT_DATE": "2026-01-01"}), 2026).unwrap();
        assert_eq!(same_year.age_estimate, None);
        let ancient = normalize_at(&json!({"PERMIT_DATE": "1900"}), 2026).unwrap();
        assert_eq!(ancient.age_estimate, None);
        let garbage = normalize_at(&json!({"PERMIT_DATE": "pending"}), 2026).unwrap();
        assert_eq!(garbage.permit_date.as_deref(), Some("pending"));
        assert_eq!(garbage.age_estimate, None);
    }

    #[test]
    fn capacity_and_tank_size() {
        let info = normalize_at(&json!({"ESTIMGPD": 300, "ACREAGE": "0.25"}), 2026).unwrap();
        assert_eq!(info.capacity.as_deref(), Some("300 GPD"));
        assert_eq!(info.estimated_tank_size.as_deref(), Some("1000-1250 gallons"));
        assert_eq!(info.lot_size.as_deref(), Some("0.25 acres"));

        assert_eq!(tank_size_for_flow(150.0), "750-1000 gallons");
        assert_eq!(tank_size_for_flow(400.0), "1250-1500 gallons");
        assert_eq!(tank_size_for_flow(401.0), "1500+ gallons");
    }

    #[test]
    fn florida_permit_fields() {
        let info = normalize_at(
            &json!({
                "APNO": "29-SC-1234567",
                "COMRESID": "Residential",
                "WSUPLTYP": "Private Well",
                "FINSYSAPRV": "Approved",
                "FINALINSP": "2011-02-03",
                "FOLIO": "012345.0000",
                "SYSTADDR": "123 PALM AVE",
                "NESTED": {"ignored": true}
            }),
            2026,
        )
        .unwrap();
        assert_eq!(info.property_type.as_deref(), Some("Residential"));
        assert_eq!(info.water_supply.as_deref(), Some("Private Well"));
        assert_eq!(info.approval_status.as_deref(), Some("Approved"));
        assert_eq!(info.final_inspection_date.as_deref(), Some("2011-02-03"));
        assert_eq!(info.tax_folio.as_deref(), Some("012345.0000"));
        assert_eq!(info.system_address.as_deref(), Some("123 PALM AVE"));
    }
}
