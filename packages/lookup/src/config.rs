//! Lookup tuning read from the environment.

use std::time::Duration;

/// Default search radius for nearest-feature queries.
pub const DEFAULT_RADIUS_METERS: f64 = 200.0;

/// Radius searched when no registered source covers a point.
pub const DEFAULT_COVERAGE_FALLBACK_RADIUS_METERS: f64 = 5_000.0;

/// Default per-query time budget for store calls.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Engine settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookupConfig {
    /// Radius used when the caller does not supply one.
    pub default_radius_meters: f64,
    /// Radius of the fallback coverage search, also the margin added
    /// around feature-derived source extents.
    pub coverage_fallback_radius_meters: f64,
    /// Time budget for each store call.
    pub query_timeout: Duration,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            default_radius_meters: DEFAULT_RADIUS_METERS,
            coverage_fallback_radius_meters: DEFAULT_COVERAGE_FALLBACK_RADIUS_METERS,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl LookupConfig {
    /// Reads `SEPTIC_DEFAULT_RADIUS_M`, `SEPTIC_COVERAGE_FALLBACK_RADIUS_M`
    /// and `SEPTIC_QUERY_TIMEOUT_MS`, falling back to defaults for unset or
    /// unparseable values.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_radius_meters: env_meters(
                "SEPTIC_DEFAULT_RADIUS_M",
                defaults.default_radius_meters,
            ),
            coverage_fallback_radius_meters: env_meters(
                "SEPTIC_COVERAGE_FALLBACK_RADIUS_M",
                defaults.coverage_fallback_radius_meters,
            ),
            query_timeout: std::env::var("SEPTIC_QUERY_TIMEOUT_MS")
                .ok()
                .and_then(|v| parse_millis("SEPTIC_QUERY_TIMEOUT_MS", &v))
                .unwrap_or(defaults.query_timeout),
        }
    }
}

fn env_meters(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_meters(name, &v))
        .unwrap_or(default)
}

fn parse_meters(name: &str, value: &str) -> Option<f64> {
    match value.trim().parse::<f64>() {
        Ok(m) if m.is_finite() && m > 0.0 => Some(m),
        _ => {
            log::warn!("Ignoring {name}={value:?}: expected a positive number of meters");
            None
        }
    }
}

fn parse_millis(name: &str, value: &str) -> Option<Duration> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            log::warn!("Ignoring {name}={value:?}: expected a positive number of milliseconds");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_meters() {
        assert_eq!(parse_meters("X", " 150 "), Some(150.0));
        assert_eq!(parse_meters("X", "0"), None);
        assert_eq!(parse_meters("X", "-5"), None);
        assert_eq!(parse_meters("X", "far"), None);
    }

    #[test]
    fn parses_timeout() {
        assert_eq!(parse_millis("X", "250"), Some(Duration::from_millis(250)));
        assert_eq!(parse_millis("X", "0"), None);
    }
}
