//! Deadline enforcement.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A request carries one absolute deadline; every wait is clipped to it
//! - Timeout is a distinct outcome, never folded into other errors

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// An absolute point in time a request must finish by.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

/// The deadline passed before the operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed;

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Await `fut`, giving up when the deadline passes.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Elapsed> {
        tokio::time::timeout_at(self.at, fut).await.map_err(|_| Elapsed)
    }

    /// Sleep for `wanted`, shortened so it never outlives the deadline.
    pub async fn sleep_clipped(&self, wanted: Duration) {
        tokio::time::sleep(wanted.min(self.remaining())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out() {
        let deadline = Deadline::after(Duration::from_millis(100));
        let result = deadline
            .run(tokio::time::sleep(Duration::from_secs(1)))
            .await;
        assert_eq!(result, Err(Elapsed));
        assert!(deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_completes_in_time() {
        let deadline = Deadline::after(Duration::from_secs(1));
        let result = deadline.run(async { 7 }).await;
        assert_eq!(result, Ok(7));
        assert!(!deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_is_clipped() {
        let deadline = Deadline::after(Duration::from_millis(50));
        let started = Instant::now();
        deadline.sleep_clipped(Duration::from_secs(10)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
