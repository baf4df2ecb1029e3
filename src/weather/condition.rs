//! Standardized condition codes.

use serde::{Deserialize, Serialize};

/// Provider-independent weather condition.
///
/// Variants are declared in ascending severity; `Ord` follows that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionCode {
    Unknown,
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Sleet,
    Snow,
    Thunderstorm,
}

impl ConditionCode {
    /// Classify free-form provider condition text.
    pub fn from_text(text: &str) -> Self {
        let t = text.trim().to_ascii_lowercase();
        if t.is_empty() {
            return Self::Unknown;
        }

        if t.contains("thunder") || t.contains("storm") {
            Self::Thunderstorm
        } else if t.contains("sleet") || t.contains("freezing") || t.contains("ice pellets") {
            Self::Sleet
        } else if t.contains("snow") || t.contains("blizzard") {
            Self::Snow
        } else if t.contains("heavy rain") || t.contains("torrential") {
            Self::HeavyRain
        } else if t.contains("drizzle") {
            Self::Drizzle
        } else if t.contains("rain") || t.contains("shower") {
            Self::Rain
        } else if t.contains("fog") || t.contains("mist") || t.contains("haze") {
            Self::Fog
        } else if t.contains("partly") || t.contains("partially") {
            Self::PartlyCloudy
        } else if t.contains("cloud") || t.contains("overcast") {
            Self::Cloudy
        } else if t.contains("clear") || t.contains("sunny") || t.contains("fair") {
            Self::Clear
        } else {
            Self::Unknown
        }
    }

    /// Canonical human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Sleet => "Sleet",
            Self::Snow => "Snow",
            Self::Thunderstorm => "Thunderstorm",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text() {
        assert_eq!(ConditionCode::from_text("Sunny"), ConditionCode::Clear);
        assert_eq!(ConditionCode::from_text("Partly cloudy"), ConditionCode::PartlyCloudy);
        assert_eq!(ConditionCode::from_text("Overcast"), ConditionCode::Cloudy);
        assert_eq!(ConditionCode::from_text("Patchy light drizzle"), ConditionCode::Drizzle);
        assert_eq!(ConditionCode::from_text("Moderate rain"), ConditionCode::Rain);
        assert_eq!(ConditionCode::from_text("Heavy rain at times"), ConditionCode::HeavyRain);
        assert_eq!(ConditionCode::from_text("Light snow"), ConditionCode::Snow);
        assert_eq!(ConditionCode::from_text("Freezing drizzle"), ConditionCode::Sleet);
        assert_eq!(ConditionCode::from_text("Thundery outbreaks possible"), ConditionCode::Thunderstorm);
        assert_eq!(ConditionCode::from_text("Mist"), ConditionCode::Fog);
        assert_eq!(ConditionCode::from_text(""), ConditionCode::Unknown);
        assert_eq!(ConditionCode::from_text("volcanic ash"), ConditionCode::Unknown);
    }

    #[test]
    fn test_severity_order() {
        assert!(ConditionCode::Thunderstorm > ConditionCode::Rain);
        assert!(ConditionCode::Rain > ConditionCode::Clear);
    }

    #[test]
    fn test_serialized_code() {
        let json = serde_json::to_string(&ConditionCode::PartlyCloudy).unwrap();
        assert_eq!(json, "\"PARTLY_CLOUDY\"");
    }
}
