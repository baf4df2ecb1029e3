//! Weather domain types.
//!
//! # Data Flow
//! ```text
//! ?city=" Paris " → normalize_city → "paris" (city_key)
//! RawForecast → upstream::transform → WeatherPayload → WeatherRecord (cached)
//! ```

pub mod condition;
pub mod types;

pub use condition::ConditionCode;
pub use types::{
    next_utc_midnight, DailySummary, HourlyEntry, Location, Temperature, TemperatureUnit,
    WeatherPayload, WeatherRecord,
};

use crate::error::GatewayError;

/// Longest accepted city name, in characters.
pub const MAX_CITY_LEN: usize = 100;

/// Normalize a user-supplied city name into a cache key.
///
/// Trims, lowercases and collapses inner whitespace. Empty, overlong or
/// control-character input is rejected.
pub fn normalize_city(raw: &str) -> Result<String, GatewayError> {
    if raw.chars().any(char::is_control) {
        return Err(GatewayError::Validation(
            "city must not contain control characters".to_string(),
        ));
    }

    let key = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    if key.is_empty() {
        return Err(GatewayError::Validation("city parameter is required".to_string()));
    }
    if key.chars().count() > MAX_CITY_LEN {
        return Err(GatewayError::Validation(format!(
            "city must be at most {MAX_CITY_LEN} characters"
        )));
    }
    Ok(key)
}
