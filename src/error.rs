//! Top-level error type.

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::store::StoreError;
use crate::upstream::FetchError;

/// Errors surfaced outside the fetch path.
///
/// Fetch-path failures never reach callers as `Err`; the orchestrator turns
/// them into fallback outcomes.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Bad caller input (HTTP 400).
    #[error("invalid request: {0}")]
    Validation(String),

    /// Shared store unreachable or inconsistent.
    #[error("infrastructure error: {0}")]
    Infrastructure(#[from] StoreError),

    #[error(transparent)]
    Upstream(#[from] FetchError),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
