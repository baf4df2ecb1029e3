//! Provider wire format.
//!
//! Field names follow the provider's JSON. Temperatures arrive as strings with
//! a unit suffix ("18.5°C") and timestamps as RFC 3339 strings; both are
//! interpreted by `transform`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawForecast {
    pub location: RawLocation,
    pub astro: RawAstro,
    pub hourly: Vec<RawHour>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLocation {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub tz_offset_seconds: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAstro {
    pub sunrise: String,
    pub sunset: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHour {
    pub hour: u8,
    pub time: String,
    pub temp: String,
    pub feels_like: String,
    pub condition: String,
    pub humidity: u8,
    pub wind_kph: f64,
    pub wind_degree: u16,
    pub pressure_mb: f64,
    pub chance_of_rain: u8,
    pub uv: f64,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A well-formed 24-hour forecast for 2024-05-01.
    pub(crate) fn forecast(name: &str, country: &str) -> RawForecast {
        let hourly = (0..24u8)
            .map(|h| RawHour {
                hour: h,
                time: format!("2024-05-01T{h:02}:00:00Z"),
                temp: format!("{:.1}°C", 10.0 + f64::from(h) * 0.5),
                feels_like: format!("{:.1}°C", 9.0 + f64::from(h) * 0.5),
                condition: if (12..16).contains(&h) {
                    "Light rain".to_string()
                } else {
                    "Sunny".to_string()
                },
                humidity: 60,
                wind_kph: 12.5,
                wind_degree: 180,
                pressure_mb: 1013.0,
                chance_of_rain: if (12..16).contains(&h) { 80 } else { 5 },
                uv: 3.0,
            })
            .collect();

        RawForecast {
            location: RawLocation {
                name: name.to_string(),
                country: country.to_string(),
                lat: 48.8566,
                lon: 2.3522,
                tz_offset_seconds: 7200,
            },
            astro: RawAstro {
                sunrise: "2024-05-01T04:30:00Z".to_string(),
                sunset: "2024-05-01T19:15:00Z".to_string(),
            },
            hourly,
        }
    }
}
