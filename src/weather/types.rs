//! Internal forecast schema and the cached record wrapping it.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::weather::condition::ConditionCode;

/// Temperature unit as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[serde(rename = "C")]
    Celsius,
    #[serde(rename = "F")]
    Fahrenheit,
}

/// A numeric temperature reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub value: f64,
    pub unit: TemperatureUnit,
    pub feels_like: f64,
}

/// Location metadata returned alongside the forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Display name as reported by the provider.
    pub name: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone_offset_seconds: i32,
}

/// One hour of the forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyEntry {
    pub hour: u8,
    pub time_utc: DateTime<Utc>,
    pub temperature: Temperature,
    pub condition: String,
    pub condition_code: ConditionCode,
    pub humidity_percent: u8,
    pub wind_speed_kph: f64,
    pub wind_direction_degrees: u16,
    pub pressure_hpa: f64,
    pub precipitation_chance_percent: u8,
    pub uv_index: f64,
}

/// Aggregate derived from the 24 hourly entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub temperature_unit: TemperatureUnit,
    pub overall_condition: String,
    pub overall_condition_code: ConditionCode,
    pub sunrise_utc: DateTime<Utc>,
    pub sunset_utc: DateTime<Utc>,
}

/// Normalized forecast for one city and one UTC day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherPayload {
    pub location: Location,
    pub hourly: Vec<HourlyEntry>,
    pub daily_summary: DailySummary,
}

/// A cached forecast together with its freshness bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub city_key: String,
    pub payload: WeatherPayload,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl WeatherRecord {
    /// Build a record fetched at `fetched_at` that stays fresh until the next
    /// UTC midnight plus `buffer`.
    pub fn new(
        city_key: impl Into<String>,
        payload: WeatherPayload,
        fetched_at: DateTime<Utc>,
        buffer: Duration,
    ) -> Self {
        Self {
            city_key: city_key.into(),
            payload,
            fetched_at,
            expires_at: next_utc_midnight(fetched_at) + buffer,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// First UTC midnight strictly after `at`.
pub fn next_utc_midnight(at: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = at.date_naive() + Duration::days(1);
    tomorrow.and_time(NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_utc_midnight() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 13, 45, 10).unwrap();
        assert_eq!(
            next_utc_midnight(at),
            Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()
        );

        // Exactly midnight rolls to the following day
        let midnight = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(
            next_utc_midnight(midnight),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_temperature_unit_serializes_short() {
        let json = serde_json::to_string(&TemperatureUnit::Celsius).unwrap();
        assert_eq!(json, "\"C\"");
        let unit: TemperatureUnit = serde_json::from_str("\"F\"").unwrap();
        assert_eq!(unit, TemperatureUnit::Fahrenheit);
    }
}
