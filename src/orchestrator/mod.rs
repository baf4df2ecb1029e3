//! Request orchestration.
//!
//! # Data Flow
//! ```text
//! CHECK_CACHE ─hit──────────────────────────────────────→ DONE(cached)
//!      │ miss
//! ACQUIRE_LOCK ─held─→ WAIT_AND_RECHECK ─hit────────────→ DONE(cached)
//!      │ acquired              └─miss──────────────────→ FALLBACK
//! CHECK_LIMITER ─denied─→ release ─────────────────────→ FALLBACK
//! CHECK_BREAKER ─denied─→ release ─────────────────────→ FALLBACK
//! FETCH ─ok─→ transform, cache, release ────────────────→ DONE(live)
//!   └─err─→ record_failure, release ───────────────────→ FALLBACK
//! FALLBACK ─stale─→ DONE(stale, warning) | DONE(unavailable)
//! ```
//!
//! # Design Decisions
//! - Store errors at any stage route to FALLBACK
//! - The fetch runs detached; a missed deadline only stops the waiting
//! - Limiter is checked before breaker

pub mod engine;
pub mod outcome;

pub use engine::Orchestrator;
pub use outcome::{DataSource, FallbackReason, QueryOutcome};
