//! Response envelopes.
//!
//! # Responsibilities
//! - Render query outcomes as the public JSON contract
//! - Map validation failures to 400
//! - Apply the configured status for unavailable responses
//!
//! # Design Decisions
//! - Success, unavailable and error bodies share `status` and `error_info`
//!   field names so clients can branch on one field

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::orchestrator::{DataSource, QueryOutcome};
use crate::weather::{DailySummary, HourlyEntry};

#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub details: String,
}

/// `status: "success"` body.
#[derive(Debug, Serialize)]
pub struct WeatherBody<'a> {
    pub status: &'static str,
    pub data_source: DataSource,
    pub city: &'a str,
    pub country_code: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone_offset_seconds: i32,
    pub last_updated_utc: DateTime<Utc>,
    pub weather_forecast: &'a [HourlyEntry],
    pub daily_summary: &'a DailySummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<&'a str>,
}

/// `status: "unavailable"` body.
#[derive(Debug, Serialize)]
pub struct UnavailableBody<'a> {
    pub status: &'static str,
    pub city: &'a str,
    pub error_info: ErrorInfo,
}

/// `status: "error"` body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub error_info: ErrorInfo,
}

/// Render a terminal query outcome.
pub fn render_outcome(outcome: &QueryOutcome, unavailable_status: StatusCode) -> Response {
    match outcome {
        QueryOutcome::Success {
            source,
            record,
            warning,
        } => {
            let location = &record.payload.location;
            let body = WeatherBody {
                status: "success",
                data_source: *source,
                city: &location.name,
                country_code: &location.country_code,
                latitude: location.latitude,
                longitude: location.longitude,
                timezone_offset_seconds: location.timezone_offset_seconds,
                last_updated_utc: record.fetched_at,
                weather_forecast: &record.payload.hourly,
                daily_summary: &record.payload.daily_summary,
                warning: warning.as_deref(),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        QueryOutcome::Unavailable { city_key, reason } => {
            let body = UnavailableBody {
                status: "unavailable",
                city: city_key,
                error_info: ErrorInfo {
                    code: reason.code().to_string(),
                    message: reason.message().to_string(),
                    details: reason.details(),
                },
            };
            (unavailable_status, Json(body)).into_response()
        }
    }
}

/// 400 for a missing or invalid `city`.
pub fn invalid_city(details: impl Into<String>) -> Response {
    let body = ErrorBody {
        status: "error",
        error_info: ErrorInfo {
            code: "INVALID_CITY".to_string(),
            message: "The 'city' query parameter is missing or invalid".to_string(),
            details: details.into(),
        },
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// 504 when a request outlives the HTTP-level timeout.
pub fn request_timed_out(limit: std::time::Duration) -> Response {
    let body = ErrorBody {
        status: "error",
        error_info: ErrorInfo {
            code: "TIMEOUT".to_string(),
            message: "The request did not complete in time".to_string(),
            details: format!("no response within {} ms", limit.as_millis()),
        },
    };
    (StatusCode::GATEWAY_TIMEOUT, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::FallbackReason;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unavailable_envelope() {
        let outcome = QueryOutcome::Unavailable {
            city_key: "paris".into(),
            reason: FallbackReason::CircuitOpen,
        };
        let response = render_outcome(&outcome, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let json = body_json(response).await;
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["city"], "paris");
        assert_eq!(json["error_info"]["code"], "CIRCUIT_OPEN");
        assert!(json["error_info"]["details"].is_string());
    }

    #[tokio::test]
    async fn test_invalid_city_envelope() {
        let response = invalid_city("city parameter is required");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["error_info"]["code"], "INVALID_CITY");
        assert_eq!(json["error_info"]["details"], "city parameter is required");
    }
}
