//! Weather API gateway library.
//!
//! Serves `GET /weather?city=` from a shared TTL store, calling the
//! upstream provider only when the cache is cold and the hourly budget,
//! circuit breaker and per-city lock all allow it.

pub mod admin;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod lock;
pub mod observability;
pub mod orchestrator;
pub mod resilience;
pub mod store;
pub mod upstream;
pub mod weather;

pub use config::schema::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
