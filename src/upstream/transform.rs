//! Pure conversion of the provider payload into the internal schema.
//!
//! Anything partial or inconsistent is rejected as a permanent failure so it
//! never reaches the cache.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::upstream::error::FetchError;
use crate::upstream::types::{RawForecast, RawHour};
use crate::weather::{
    ConditionCode, DailySummary, HourlyEntry, Location, Temperature, TemperatureUnit,
    WeatherPayload,
};

const HOURS_PER_DAY: usize = 24;

/// Convert a provider forecast into a `WeatherPayload`.
pub fn transform(raw: &RawForecast) -> Result<WeatherPayload, FetchError> {
    if raw.hourly.len() != HOURS_PER_DAY {
        return Err(FetchError::permanent(format!(
            "expected {HOURS_PER_DAY} hourly entries, got {}",
            raw.hourly.len()
        )));
    }

    let mut seen = [false; HOURS_PER_DAY];
    let mut hourly = Vec::with_capacity(HOURS_PER_DAY);
    let mut unit: Option<TemperatureUnit> = None;

    for raw_hour in &raw.hourly {
        let slot = usize::from(raw_hour.hour);
        if slot >= HOURS_PER_DAY {
            return Err(FetchError::permanent(format!(
                "hour {} out of range",
                raw_hour.hour
            )));
        }
        if seen[slot] {
            return Err(FetchError::permanent(format!(
                "hour {} appears more than once",
                raw_hour.hour
            )));
        }
        seen[slot] = true;

        let entry = convert_hour(raw_hour)?;
        match unit {
            None => unit = Some(entry.temperature.unit),
            Some(u) if u != entry.temperature.unit => {
                return Err(FetchError::permanent("mixed temperature units"));
            }
            Some(_) => {}
        }
        hourly.push(entry);
    }

    hourly.sort_by_key(|e| e.hour);

    let temperature_unit = unit.unwrap_or(TemperatureUnit::Celsius);
    let daily_summary = summarize(&hourly, temperature_unit, raw)?;

    let location = Location {
        name: raw.location.name.trim().to_string(),
        country_code: raw.location.country.trim().to_uppercase(),
        latitude: raw.location.lat,
        longitude: raw.location.lon,
        timezone_offset_seconds: raw.location.tz_offset_seconds,
    };
    if location.name.is_empty() {
        return Err(FetchError::permanent("location name missing"));
    }
    if !(-90.0..=90.0).contains(&location.latitude)
        || !(-180.0..=180.0).contains(&location.longitude)
    {
        return Err(FetchError::permanent("coordinates out of range"));
    }

    Ok(WeatherPayload {
        location,
        hourly,
        daily_summary,
    })
}

fn convert_hour(raw: &RawHour) -> Result<HourlyEntry, FetchError> {
    let (value, unit) = parse_temperature(&raw.temp)?;
    let (feels_like, feels_unit) = parse_temperature(&raw.feels_like)?;
    if unit != feels_unit {
        return Err(FetchError::permanent(format!(
            "hour {}: temperature and feels-like units differ",
            raw.hour
        )));
    }
    if raw.humidity > 100 || raw.chance_of_rain > 100 || raw.wind_degree > 360 {
        return Err(FetchError::permanent(format!(
            "hour {}: percentage or bearing out of range",
            raw.hour
        )));
    }

    Ok(HourlyEntry {
        hour: raw.hour,
        time_utc: parse_timestamp("time", &raw.time)?,
        temperature: Temperature {
            value,
            unit,
            feels_like,
        },
        condition: raw.condition.trim().to_string(),
        condition_code: ConditionCode::from_text(&raw.condition),
        humidity_percent: raw.humidity,
        wind_speed_kph: raw.wind_kph,
        wind_direction_degrees: raw.wind_degree,
        pressure_hpa: raw.pressure_mb,
        precipitation_chance_percent: raw.chance_of_rain,
        uv_index: raw.uv,
    })
}

fn summarize(
    hourly: &[HourlyEntry],
    temperature_unit: TemperatureUnit,
    raw: &RawForecast,
) -> Result<DailySummary, FetchError> {
    let min_temperature = hourly
        .iter()
        .map(|e| e.temperature.value)
        .fold(f64::INFINITY, f64::min);
    let max_temperature = hourly
        .iter()
        .map(|e| e.temperature.value)
        .fold(f64::NEG_INFINITY, f64::max);

    let overall = overall_condition(hourly);

    Ok(DailySummary {
        min_temperature,
        max_temperature,
        temperature_unit,
        overall_condition: overall.description().to_string(),
        overall_condition_code: overall,
        sunrise_utc: parse_timestamp("sunrise", &raw.astro.sunrise)?,
        sunset_utc: parse_timestamp("sunset", &raw.astro.sunset)?,
    })
}

/// Most frequent condition; ties go to the more severe one.
fn overall_condition(hourly: &[HourlyEntry]) -> ConditionCode {
    let mut counts: HashMap<ConditionCode, usize> = HashMap::new();
    for entry in hourly {
        *counts.entry(entry.condition_code).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by_key(|&(code, count)| (count, code))
        .map(|(code, _)| code)
        .unwrap_or(ConditionCode::Unknown)
}

/// Parse "18.5°C", "18.5 C", "65°F" and similar.
pub fn parse_temperature(text: &str) -> Result<(f64, TemperatureUnit), FetchError> {
    let trimmed = text.trim();
    let (number, unit) = if let Some(n) = strip_unit(trimmed, 'C') {
        (n, TemperatureUnit::Celsius)
    } else if let Some(n) = strip_unit(trimmed, 'F') {
        (n, TemperatureUnit::Fahrenheit)
    } else {
        return Err(FetchError::permanent(format!(
            "temperature '{text}' has no recognised unit"
        )));
    };

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| FetchError::permanent(format!("temperature '{text}' is not numeric")))?;
    if !value.is_finite() {
        return Err(FetchError::permanent(format!(
            "temperature '{text}' is not finite"
        )));
    }
    Ok((value, unit))
}

fn strip_unit(text: &str, letter: char) -> Option<&str> {
    let rest = text
        .strip_suffix(letter)
        .or_else(|| text.strip_suffix(letter.to_ascii_lowercase()))?;
    Some(rest.trim_end().strip_suffix('°').unwrap_or(rest))
}

fn parse_timestamp(field: &str, text: &str) -> Result<DateTime<Utc>, FetchError> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| FetchError::permanent(format!("{field} '{text}' is not RFC 3339: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::types::fixtures;

    #[test]
    fn test_transform_well_formed() {
        let raw = fixtures::forecast("Paris", "fr");
        let payload = transform(&raw).unwrap();

        assert_eq!(payload.hourly.len(), 24);
        assert_eq!(payload.location.country_code, "FR");
        assert_eq!(payload.hourly[0].temperature.value, 10.0);
        assert_eq!(payload.hourly[0].temperature.unit, TemperatureUnit::Celsius);
        assert_eq!(payload.hourly[0].condition_code, ConditionCode::Clear);
        assert_eq!(payload.hourly[13].condition_code, ConditionCode::Rain);
        assert_eq!(payload.daily_summary.min_temperature, 10.0);
        assert_eq!(payload.daily_summary.max_temperature, 21.5);
        assert_eq!(payload.daily_summary.overall_condition_code, ConditionCode::Clear);
        assert_eq!(payload.daily_summary.overall_condition, "Clear");
    }

    #[test]
    fn test_hours_are_sorted() {
        let mut raw = fixtures::forecast("Paris", "FR");
        raw.hourly.reverse();
        let payload = transform(&raw).unwrap();
        let hours: Vec<u8> = payload.hourly.iter().map(|e| e.hour).collect();
        assert_eq!(hours, (0..24).collect::<Vec<u8>>());
    }

    #[test]
    fn test_partial_payload_rejected() {
        let mut raw = fixtures::forecast("Paris", "FR");
        raw.hourly.truncate(23);
        let err = transform(&raw).unwrap_err();
        assert!(!err.is_transient());
        assert!(err.reason().contains("got 23"));
    }

    #[test]
    fn test_duplicate_hour_rejected() {
        let mut raw = fixtures::forecast("Paris", "FR");
        raw.hourly[5].hour = 4;
        assert!(transform(&raw).unwrap_err().reason().contains("more than once"));
    }

    #[test]
    fn test_mixed_units_rejected() {
        let mut raw = fixtures::forecast("Paris", "FR");
        raw.hourly[3].temp = "55°F".into();
        raw.hourly[3].feels_like = "54°F".into();
        assert!(transform(&raw).unwrap_err().reason().contains("mixed"));
    }

    #[test]
    fn test_parse_temperature_variants() {
        assert_eq!(parse_temperature("18.5°C").unwrap(), (18.5, TemperatureUnit::Celsius));
        assert_eq!(parse_temperature(" -3 C ").unwrap(), (-3.0, TemperatureUnit::Celsius));
        assert_eq!(parse_temperature("65°F").unwrap(), (65.0, TemperatureUnit::Fahrenheit));
        assert_eq!(parse_temperature("70 °f").unwrap(), (70.0, TemperatureUnit::Fahrenheit));
        assert!(parse_temperature("18.5").is_err());
        assert!(parse_temperature("warm°C").is_err());
        assert!(parse_temperature("").is_err());
    }

    #[test]
    fn test_overall_condition_tie_breaks_on_severity() {
        let mut raw = fixtures::forecast("Tokyo", "JP");
        for (i, hour) in raw.hourly.iter_mut().enumerate() {
            hour.condition = if i < 12 { "Sunny" } else { "Thunderstorm" }.to_string();
        }
        let payload = transform(&raw).unwrap();
        assert_eq!(
            payload.daily_summary.overall_condition_code,
            ConditionCode::Thunderstorm
        );
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let mut raw = fixtures::forecast("Paris", "FR");
        raw.astro.sunrise = "half past four".into();
        assert!(transform(&raw).unwrap_err().reason().contains("sunrise"));
    }
}
