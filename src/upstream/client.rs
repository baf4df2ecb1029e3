//! HTTP client for the third-party weather provider.

use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use crate::config::{RetryConfig, UpstreamConfig};
use crate::observability::metrics;
use crate::resilience::retries::{retry_with_backoff, RetryPolicy};
use crate::upstream::error::FetchError;
use crate::upstream::types::RawForecast;
use crate::upstream::ForecastSource;

const FORECAST_PATH: &str = "/v1/forecast";

/// Longest slice of an error body kept in a failure reason.
const MAX_REASON_BODY: usize = 200;

/// Retrying client for `GET {base_url}/v1/forecast?city=..&key=..`.
///
/// Knows nothing about the circuit breaker; callers record outcomes.
#[derive(Debug, Clone)]
pub struct WeatherApiClient {
    client: reqwest::Client,
    forecast_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl WeatherApiClient {
    pub fn new(upstream: &UpstreamConfig, retries: &RetryConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(upstream.attempt_timeout_ms))
            .user_agent(upstream.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            forecast_url: format!("{}{}", upstream.base_url.trim_end_matches('/'), FORECAST_PATH),
            api_key: upstream.api_key.clone(),
            retry: RetryPolicy::from(retries),
        })
    }

    /// One HTTP attempt, classified.
    async fn fetch_once(&self, city_key: &str, attempt: u32) -> Result<RawForecast, FetchError> {
        let response = self
            .client
            .get(&self.forecast_url)
            .query(&[("city", city_key), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(FetchError::from_reqwest);

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                metrics::record_upstream_call("transport_error");
                return Err(e);
            }
        };

        let status = response.status();
        tracing::debug!(city = %city_key, attempt, status = status.as_u16(), "Provider responded");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = if body.is_empty() {
                status.canonical_reason().unwrap_or("error").to_string()
            } else {
                body.chars().take(MAX_REASON_BODY).collect()
            };
            let err = FetchError::from_status(status.as_u16(), reason);
            metrics::record_upstream_call(if err.is_transient() {
                "transient_status"
            } else {
                "permanent_status"
            });
            return Err(err);
        }

        let bytes = response.bytes().await.map_err(|e| {
            metrics::record_upstream_call("transport_error");
            FetchError::from_reqwest(e)
        })?;

        serde_json::from_slice::<RawForecast>(&bytes).map_err(|e| {
            metrics::record_upstream_call("malformed");
            FetchError::Permanent {
                status: Some(status.as_u16()),
                reason: format!("malformed forecast body: {e}"),
            }
        })
        .inspect(|_| metrics::record_upstream_call("ok"))
    }
}

#[async_trait]
impl ForecastSource for WeatherApiClient {
    #[instrument(skip(self), level = "info")]
    async fn fetch(&self, city_key: &str) -> Result<RawForecast, FetchError> {
        retry_with_backoff(&self.retry, "forecast_fetch", |attempt| {
            self.fetch_once(city_key, attempt)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::types::fixtures;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> WeatherApiClient {
        let upstream = UpstreamConfig {
            base_url: server.uri(),
            api_key: "secret".into(),
            attempt_timeout_ms: 300,
            ..UpstreamConfig::default()
        };
        let retries = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        WeatherApiClient::new(&upstream, &retries).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("city", "paris"))
            .and(query_param("key", "secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(fixtures::forecast("Paris", "FR")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let raw = client_for(&server).fetch("paris").await.unwrap();
        assert_eq!(raw.location.name, "Paris");
        assert_eq!(raw.hourly.len(), 24);
    }

    #[tokio::test]
    async fn test_transient_status_retried_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(fixtures::forecast("Tokyo", "JP")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let raw = client_for(&server).fetch("tokyo").await.unwrap();
        assert_eq!(raw.location.country, "JP");
    }

    #[tokio::test]
    async fn test_transient_exhausts_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server).fetch("paris").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.status(), Some(502));
    }

    #[tokio::test]
    async fn test_not_found_is_permanent_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("unknown city"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).fetch("atlantis").await.unwrap_err();
        assert_eq!(
            err,
            FetchError::Permanent {
                status: Some(404),
                reason: "unknown city".into()
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"location\": 1}"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).fetch("paris").await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.reason().contains("malformed"));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out_as_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(fixtures::forecast("Paris", "FR"))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).fetch("paris").await.unwrap_err();
        assert!(err.is_transient());
        assert!(!err.reason().contains("secret"));
    }
}
