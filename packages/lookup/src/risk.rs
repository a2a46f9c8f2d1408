//! Age-based failure risk.

use septic_locator_lookup_models::{NormalizedAttributes, RiskLevel};

/// Systems older than this are high risk.
pub const HIGH_RISK_AGE_YEARS: u32 = 25;

/// Systems older than this are medium risk.
pub const MEDIUM_RISK_AGE_YEARS: u32 = 15;

/// Estimates failure risk from the normalized age.
///
/// Returns `None` when no age could be derived.
#[must_use]
pub fn estimate_risk(attributes: &NormalizedAttributes) -> Option<RiskLevel> {
    attributes
        .age_estimate
        .as_deref()
        .and_then(parse_age)
        .map(risk_for_age)
}

/// Maps a system age onto a risk tier.
#[must_use]
pub const fn risk_for_age(age_years: u32) -> RiskLevel {
    if age_years > HIGH_RISK_AGE_YEARS {
        RiskLevel::High
    } else if age_years > MEDIUM_RISK_AGE_YEARS {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Leading integer of an `"{n} years old"` string.
fn parse_age(text: &str) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok().filter(|age| *age > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_age(age: &str) -> NormalizedAttributes {
        NormalizedAttributes {
            age_estimate: Some(age.to_string()),
            ..NormalizedAttributes::default()
        }
    }

    #[test]
    fn tiers_are_strictly_greater_than() {
        assert_eq!(estimate_risk(&with_age("26 years old")), Some(RiskLevel::High));
        assert_eq!(estimate_risk(&with_age("25 years old")), Some(RiskLevel::Medium));
        assert_eq!(estimate_risk(&with_age("16 years old")), Some(RiskLevel::Medium));
        assert_eq!(estimate_risk(&with_age("15 years old")), Some(RiskLevel::Low));
        assert_eq!(estimate_risk(&with_age("1 years old")), Some(RiskLevel::Low));
    }

    #[test]
    fn no_age_no_risk() {
        assert_eq!(estimate_risk(&NormalizedAttributes::default()), None);
        assert_eq!(estimate_risk(&with_age("unknown")), None);
    }
}
