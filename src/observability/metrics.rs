//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): queries by outcome (live, cached, stale, unavailable, invalid)
//! - `gateway_request_duration_seconds` (histogram): end-to-end query latency
//! - `gateway_cache_lookups_total` (counter): fresh-cache lookups by result
//! - `gateway_upstream_calls_total` (counter): provider attempts by outcome
//! - `gateway_upstream_duration_seconds` (histogram): fetch + transform latency
//! - `gateway_rate_limited_total` (counter): requests denied by the hourly budget
//! - `gateway_fallbacks_total` (counter): fallbacks by reason
//! - `gateway_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_lock_contention_total` (counter): lock acquisitions that found a holder
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Labels are low-cardinality; city names are never labels

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

/// Record a finished public query.
pub fn record_request(outcome: &'static str, start: Instant) {
    counter!("gateway_requests_total", "outcome" => outcome).increment(1);
    histogram!("gateway_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(result: &'static str) {
    counter!("gateway_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_upstream_call(outcome: &'static str) {
    counter!("gateway_upstream_calls_total", "outcome" => outcome).increment(1);
}

pub fn record_upstream_duration(elapsed: Duration) {
    histogram!("gateway_upstream_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_fallback(reason: &'static str) {
    counter!("gateway_fallbacks_total", "reason" => reason).increment(1);
}

pub fn set_circuit_state(value: f64) {
    gauge!("gateway_circuit_state").set(value);
}

pub fn record_lock_contention() {
    counter!("gateway_lock_contention_total").increment(1);
}
