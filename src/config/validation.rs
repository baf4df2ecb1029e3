//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ratios within 0..=1, ports valid)
//! - Check cross-field consistency (lock wait bounds, deadline vs retries)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// Upper bound for every duration setting: ten years.
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 3600;
const MAX_DURATION_MS: u64 = MAX_DURATION_SECS * 1000;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: invalid URL '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: String,
        max: String,
        value: String,
    },

    #[error("lock.wait_min_ms ({min}) exceeds lock.wait_max_ms ({max})")]
    InvertedLockWait { min: u64, max: u64 },

    #[error("observability.log_format must be 'pretty' or 'json', got '{0}'")]
    UnknownLogFormat(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        _ => errors.push(ValidationError::InvalidUrl {
            field: "upstream.base_url",
            value: config.upstream.base_url.clone(),
        }),
    }

    let non_zero: [(&'static str, u64); 9] = [
        ("timeouts.request_ms", config.timeouts.request_ms),
        ("upstream.attempt_timeout_ms", config.upstream.attempt_timeout_ms),
        ("retries.max_attempts", config.retries.max_attempts as u64),
        ("rate_limit.hourly_limit", config.rate_limit.hourly_limit),
        ("circuit_breaker.failure_threshold", config.circuit_breaker.failure_threshold as u64),
        ("circuit_breaker.rate_window_secs", config.circuit_breaker.rate_window_secs),
        ("circuit_breaker.reset_timeout_secs", config.circuit_breaker.reset_timeout_secs),
        ("lock.ttl_ms", config.lock.ttl_ms),
        ("cache.sweep_interval_secs", config.cache.sweep_interval_secs),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let seconds: [(&'static str, u64); 7] = [
        ("cache.expiry_buffer_secs", config.cache.expiry_buffer_secs),
        ("cache.stale_retention_secs", config.cache.stale_retention_secs),
        ("cache.sweep_interval_secs", config.cache.sweep_interval_secs),
        ("rate_limit.window_margin_secs", config.rate_limit.window_margin_secs),
        ("circuit_breaker.rate_window_secs", config.circuit_breaker.rate_window_secs),
        ("circuit_breaker.reset_timeout_secs", config.circuit_breaker.reset_timeout_secs),
        ("circuit_breaker.trial_timeout_secs", config.circuit_breaker.trial_timeout_secs),
    ];
    for (field, value) in seconds {
        check_max(&mut errors, field, value, MAX_DURATION_SECS);
    }

    let millis: [(&'static str, u64); 7] = [
        ("timeouts.request_ms", config.timeouts.request_ms),
        ("upstream.attempt_timeout_ms", config.upstream.attempt_timeout_ms),
        ("retries.base_delay_ms", config.retries.base_delay_ms),
        ("retries.max_delay_ms", config.retries.max_delay_ms),
        ("lock.ttl_ms", config.lock.ttl_ms),
        ("lock.wait_min_ms", config.lock.wait_min_ms),
        ("lock.wait_max_ms", config.lock.wait_max_ms),
    ];
    for (field, value) in millis {
        check_max(&mut errors, field, value, MAX_DURATION_MS);
    }

    let rate = config.circuit_breaker.failure_rate_threshold;
    if !(rate > 0.0 && rate <= 1.0) {
        errors.push(ValidationError::OutOfRange {
            field: "circuit_breaker.failure_rate_threshold",
            min: "0.0 (exclusive)".to_string(),
            max: "1.0".to_string(),
            value: rate.to_string(),
        });
    }

    let status = config.response.unavailable_status;
    if !(200..=599).contains(&status) {
        errors.push(ValidationError::OutOfRange {
            field: "response.unavailable_status",
            min: "200".to_string(),
            max: "599".to_string(),
            value: status.to_string(),
        });
    }

    if config.lock.wait_min_ms > config.lock.wait_max_ms {
        errors.push(ValidationError::InvertedLockWait {
            min: config.lock.wait_min_ms,
            max: config.lock.wait_max_ms,
        });
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::UnknownLogFormat(other.to_string())),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_max(errors: &mut Vec<ValidationError>, field: &'static str, value: u64, max: u64) {
    if value > max {
        errors.push(ValidationError::OutOfRange {
            field,
            min: "0".to_string(),
            max: max.to_string(),
            value: value.to_string(),
        });
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
