//! Shared atomic storage substrate.
//!
//! # Data Flow
//! ```text
//! cache (records)      ─┐
//! rate_limit (counters) ├─→ Store trait ─→ MemoryStore (dashmap, lazy expiry)
//! circuit_breaker (CAS) │
//! lock (set-if-absent) ─┘
//! ```
//!
//! # Design Decisions
//! - Every coordination primitive is a single-key atomic operation
//! - TTL is part of each write; expired keys read as absent
//! - Time comes from a `Clock` so expiry is testable without sleeping

pub mod clock;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryStore;

/// Errors raised by the storage substrate.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be encoded or decoded.
    #[error("store codec error for key {key}: {reason}")]
    Codec { key: String, reason: String },

    /// A compare-and-swap loop gave up after repeated conflicts.
    #[error("too much contention on key {0}")]
    Contention(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Key/value operations shared by every gateway instance.
///
/// Each method must be linearizable per key.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Read a live value.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Unconditionally write a value with an expiry.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()>;

    /// Write only if no live value exists. Returns whether the write happened.
    async fn set_if_absent(&self, key: &str, value: String, ttl: Duration) -> StoreResult<bool>;

    /// Atomically add one to an integer counter and return the new value.
    ///
    /// `ttl` is applied only when the counter is created.
    async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<u64>;

    /// Replace the value iff the current live value equals `expected`
    /// (`None` meaning absent). A `ttl` of `None` stores without expiry.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: String,
        ttl: Option<Duration>,
    ) -> StoreResult<bool>;

    /// Delete the key iff its live value equals `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool>;
}
