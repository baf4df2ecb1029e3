//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream call:
//!     → rate_limit.rs (global hourly budget, shared through the store)
//!     → circuit_breaker.rs (fail fast while the provider is down)
//!     → retries.rs (transient failures retried with backoff.rs delays)
//!     → timeouts.rs (one deadline bounds the whole request)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries only for transient failures
//! - Limiter and breaker keep their state in the shared store so every
//!   gateway instance sees the same budget and the same circuit

pub mod backoff;
pub mod circuit_breaker;
pub mod rate_limit;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use rate_limit::{HourlyRateLimiter, WindowStatus};
pub use retries::{retry_with_backoff, RetryPolicy, Retryable};
pub use timeouts::{Deadline, Elapsed};
