//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, env overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server rebuilds the orchestrator over the same store
//!     → atomic swap via arc-swap
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    AdminConfig, CacheConfig, CircuitBreakerConfig, GatewayConfig, ListenerConfig, LockConfig,
    ObservabilityConfig, RateLimitConfig, ResponseConfig, RetryConfig, TimeoutConfig,
    UpstreamConfig,
};
pub use loader::{finalize_config, load_config, parse_config, ConfigError};
pub use watcher::ConfigWatcher;
