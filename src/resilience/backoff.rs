//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Delay before retry number `attempt` (1-based; 0 means no delay).
///
/// The delay doubles from `base_ms` per attempt, is capped at `max_ms`, and
/// then gets up to 10% of random jitter added.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b1 = calculate_backoff(1, 200, 2000);
        assert!(b1.as_millis() >= 200 && b1.as_millis() < 220);

        let b2 = calculate_backoff(2, 200, 2000);
        assert!(b2.as_millis() >= 400 && b2.as_millis() < 440);

        let max = calculate_backoff(10, 200, 2000);
        assert!(max.as_millis() >= 2000 && max.as_millis() < 2200);
    }

    #[test]
    fn test_zeroth_attempt_has_no_delay() {
        assert_eq!(calculate_backoff(0, 200, 2000), Duration::ZERO);
    }

    #[test]
    fn test_huge_attempt_saturates() {
        let d = calculate_backoff(u32::MAX, u64::MAX, 5000);
        assert!(d.as_millis() >= 5000);
    }
}
