//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the weather gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Public listener.
    pub listener: ListenerConfig,

    /// Per-request deadline.
    pub timeouts: TimeoutConfig,

    /// Third-party weather provider.
    pub upstream: UpstreamConfig,

    /// Retry policy for upstream calls.
    pub retries: RetryConfig,

    /// Forecast cache freshness and retention.
    pub cache: CacheConfig,

    /// Global hourly budget of upstream calls.
    pub rate_limit: RateLimitConfig,

    /// Upstream circuit breaker.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Per-city fetch lock.
    pub lock: LockConfig,

    /// Shape of degraded responses.
    pub response: ResponseConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound on answering one query, in milliseconds.
    pub request_ms: u64,
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_ms: 5000 }
    }
}

/// Weather provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Provider base URL.
    pub base_url: String,

    /// Provider API key. Overridden by `WEATHER_GATEWAY_API_KEY`.
    pub api_key: String,

    /// Timeout for a single HTTP attempt, in milliseconds.
    pub attempt_timeout_ms: u64,

    /// User-Agent sent to the provider.
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".to_string(),
            api_key: String::new(),
            attempt_timeout_ms: 1500,
            user_agent: concat!("weather-gateway/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2000,
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds past UTC midnight a record stays fresh.
    pub expiry_buffer_secs: u64,

    /// How long an expired record remains readable as stale.
    pub stale_retention_secs: u64,

    /// Interval of the background sweep of expired keys.
    pub sweep_interval_secs: u64,
}

impl CacheConfig {
    pub fn expiry_buffer(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.expiry_buffer_secs as i64)
    }

    pub fn stale_retention(&self) -> Duration {
        Duration::from_secs(self.stale_retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiry_buffer_secs: 300,
            stale_retention_secs: 48 * 3600,
            sweep_interval_secs: 60,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Upstream calls allowed per UTC hour, across all instances.
    pub hourly_limit: u64,

    /// Extra lifetime of a window counter past its hour.
    pub window_margin_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            hourly_limit: 100,
            window_margin_secs: 60,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Failure ratio (0.0-1.0) over the trailing window that opens the circuit.
    pub failure_rate_threshold: f64,

    /// Length of the trailing window in seconds.
    pub rate_window_secs: u64,

    /// Samples required in the window before the ratio is considered.
    pub min_requests_in_window: u32,

    /// Seconds the circuit stays open before a trial is allowed.
    pub reset_timeout_secs: u64,

    /// Seconds after which an unreported trial is considered abandoned.
    pub trial_timeout_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_rate_threshold: 0.5,
            rate_window_secs: 10,
            min_requests_in_window: 10,
            reset_timeout_secs: 60,
            trial_timeout_secs: 10,
        }
    }
}

/// Per-city lock configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LockConfig {
    /// Lock lifetime in milliseconds.
    pub ttl_ms: u64,

    /// Lower bound of the contention wait in milliseconds.
    pub wait_min_ms: u64,

    /// Upper bound of the contention wait in milliseconds.
    pub wait_max_ms: u64,
}

impl LockConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 10_000,
            wait_min_ms: 500,
            wait_max_ms: 1000,
        }
    }
}

/// Degraded response configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// HTTP status used when no data of any freshness exists.
    pub unavailable_status: u16,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            unavailable_status: 200,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.rate_limit.hourly_limit, 100);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.reset_timeout_secs, 60);
        assert_eq!(config.lock.ttl(), Duration::from_secs(10));
        assert_eq!(config.retries.max_attempts, 3);
        assert_eq!(config.timeouts.request(), Duration::from_secs(5));
        assert_eq!(config.cache.expiry_buffer(), chrono::Duration::minutes(5));
        assert_eq!(config.response.unavailable_status, 200);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [upstream]
            base_url = "https://api.example.com"

            [rate_limit]
            hourly_limit = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.base_url, "https://api.example.com");
        assert_eq!(config.upstream.attempt_timeout_ms, 1500);
        assert_eq!(config.rate_limit.hourly_limit, 250);
        assert_eq!(config.rate_limit.window_margin_secs, 60);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }
}
