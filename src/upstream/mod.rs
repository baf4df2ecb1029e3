//! External weather provider.
//!
//! # Data Flow
//! ```text
//! orchestrator
//!     → ForecastSource::fetch (client.rs: HTTP + retries)
//!     → RawForecast (types.rs: provider wire format)
//!     → transform.rs (pure: validate, normalize, summarize)
//!     → WeatherPayload
//! ```
//!
//! # Design Decisions
//! - Failures are classified once, at the edge, as Transient or Permanent
//! - The client never records breaker outcomes
//! - A payload that fails transformation is Permanent and never cached

pub mod client;
pub mod error;
pub mod transform;
pub mod types;

use async_trait::async_trait;

pub use client::WeatherApiClient;
pub use error::FetchError;
pub use transform::transform;
pub use types::RawForecast;

/// Anything that can produce a raw forecast for a normalized city key.
#[async_trait]
pub trait ForecastSource: Send + Sync + 'static {
    async fn fetch(&self, city_key: &str) -> Result<RawForecast, FetchError>;
}
