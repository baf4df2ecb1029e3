//! Terminal results of a query.

use serde::Serialize;

use crate::upstream::FetchError;
use crate::weather::WeatherRecord;

/// Where the returned forecast came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    Cached,
    Stale,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Live => "live",
            DataSource::Cached => "cached",
            DataSource::Stale => "stale",
        }
    }
}

/// Why a query could not be answered with fresh data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    RateLimited,
    CircuitOpen,
    /// Another request held the city lock and nothing was cached after the wait.
    LockContended,
    UpstreamFailed(FetchError),
    Timeout,
    Infrastructure(String),
}

impl FallbackReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            FallbackReason::RateLimited => "RATE_LIMITED",
            FallbackReason::CircuitOpen => "CIRCUIT_OPEN",
            FallbackReason::LockContended => "FETCH_IN_PROGRESS",
            FallbackReason::UpstreamFailed(e) if e.is_transient() => "UPSTREAM_UNAVAILABLE",
            FallbackReason::UpstreamFailed(_) => "UPSTREAM_ERROR",
            FallbackReason::Timeout => "TIMEOUT",
            FallbackReason::Infrastructure(_) => "INFRASTRUCTURE_ERROR",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FallbackReason::RateLimited => "Hourly upstream request budget exhausted",
            FallbackReason::CircuitOpen => "Weather provider temporarily disabled after repeated failures",
            FallbackReason::LockContended => "Forecast for this city is being fetched by another request",
            FallbackReason::UpstreamFailed(e) if e.is_transient() => {
                "Weather provider is temporarily unavailable"
            }
            FallbackReason::UpstreamFailed(_) => "Weather provider returned an unusable response",
            FallbackReason::Timeout => "Request deadline exceeded while fetching the forecast",
            FallbackReason::Infrastructure(_) => "Internal storage is unavailable",
        }
    }

    pub fn details(&self) -> String {
        match self {
            FallbackReason::RateLimited => {
                "The global limit of upstream calls for the current UTC hour has been reached. \
                 Try again after the top of the hour."
                    .to_string()
            }
            FallbackReason::CircuitOpen => {
                "Upstream calls are paused while the provider recovers. Try again in about a minute."
                    .to_string()
            }
            FallbackReason::LockContended => "Try again in a few seconds.".to_string(),
            FallbackReason::UpstreamFailed(e) => match e.status() {
                Some(status) => format!("Provider status {status}: {}", e.reason()),
                None => e.reason().to_string(),
            },
            FallbackReason::Timeout => "The forecast may be available shortly.".to_string(),
            FallbackReason::Infrastructure(detail) => detail.clone(),
        }
    }

    /// Low-cardinality label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FallbackReason::RateLimited => "rate_limited",
            FallbackReason::CircuitOpen => "circuit_open",
            FallbackReason::LockContended => "lock_contended",
            FallbackReason::UpstreamFailed(_) => "upstream_failed",
            FallbackReason::Timeout => "timeout",
            FallbackReason::Infrastructure(_) => "infrastructure",
        }
    }
}

/// Terminal state of one query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Success {
        source: DataSource,
        record: WeatherRecord,
        /// Present only for stale data.
        warning: Option<String>,
    },
    Unavailable {
        city_key: String,
        reason: FallbackReason,
    },
}

impl QueryOutcome {
    pub fn fresh(source: DataSource, record: WeatherRecord) -> Self {
        QueryOutcome::Success {
            source,
            record,
            warning: None,
        }
    }

    pub fn stale(record: WeatherRecord, reason: &FallbackReason) -> Self {
        let warning = format!(
            "Serving data last updated at {} because: {}",
            record.fetched_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            reason.message()
        );
        QueryOutcome::Success {
            source: DataSource::Stale,
            record,
            warning: Some(warning),
        }
    }

    /// `live`, `cached`, `stale` or `unavailable`.
    pub fn label(&self) -> &'static str {
        match self {
            QueryOutcome::Success { source, .. } => source.as_str(),
            QueryOutcome::Unavailable { .. } => "unavailable",
        }
    }

    pub fn source(&self) -> Option<DataSource> {
        match self {
            QueryOutcome::Success { source, .. } => Some(*source),
            QueryOutcome::Unavailable { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_distinguish_upstream_failures() {
        let transient = FallbackReason::UpstreamFailed(FetchError::from_status(503, "down"));
        let permanent = FallbackReason::UpstreamFailed(FetchError::from_status(404, "no city"));
        assert_eq!(transient.code(), "UPSTREAM_UNAVAILABLE");
        assert_eq!(permanent.code(), "UPSTREAM_ERROR");
        assert_eq!(permanent.details(), "Provider status 404: no city");
        assert_eq!(transient.label(), permanent.label());
    }

    #[test]
    fn test_data_source_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&DataSource::Stale).unwrap(), "\"stale\"");
        assert_eq!(DataSource::Live.as_str(), "live");
    }
}
