//! Global fixed-window rate limiter for upstream calls.
//!
//! One counter per UTC hour, shared by every gateway instance through the
//! store. A denied request still consumes its increment; counts are never
//! refunded, so the counter is monotonically non-decreasing within a window.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};

use crate::config::RateLimitConfig;
use crate::store::{Store, StoreError, StoreResult};

const KEY_PREFIX: &str = "ratelimit:";

/// Strict per-hour counter; not a token bucket.
#[derive(Clone)]
pub struct HourlyRateLimiter {
    store: Arc<dyn Store>,
    hourly_limit: u64,
    window_margin: Duration,
}

/// Counter state for the window containing a given instant.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct WindowStatus {
    pub window_key: String,
    pub count: u64,
    pub limit: u64,
    pub window_end: DateTime<Utc>,
}

impl HourlyRateLimiter {
    pub fn new(store: Arc<dyn Store>, config: &RateLimitConfig) -> Self {
        Self {
            store,
            hourly_limit: config.hourly_limit,
            window_margin: Duration::from_secs(config.window_margin_secs),
        }
    }

    /// Consume one unit of the current hour's budget.
    pub async fn allow_request(&self, now: DateTime<Utc>) -> StoreResult<bool> {
        let (window_key, window_end) = window_for(now)?;
        let ttl = (window_end - now).to_std().unwrap_or_default() + self.window_margin;

        let count = self.store.increment(&store_key(&window_key), ttl).await?;
        let allowed = count <= self.hourly_limit;
        if !allowed {
            tracing::warn!(
                window = %window_key,
                count,
                limit = self.hourly_limit,
                "Hourly upstream budget exhausted"
            );
        }
        Ok(allowed)
    }

    /// Read the current window without consuming budget.
    pub async fn current_count(&self, now: DateTime<Utc>) -> StoreResult<WindowStatus> {
        let (window_key, window_end) = window_for(now)?;
        let key = store_key(&window_key);
        let count = match self.store.get(&key).await? {
            Some(raw) => raw.parse::<u64>().map_err(|e| StoreError::Codec {
                key: key.clone(),
                reason: e.to_string(),
            })?,
            None => 0,
        };
        Ok(WindowStatus {
            window_key,
            count,
            limit: self.hourly_limit,
            window_end,
        })
    }
}

/// `YYYYMMDDHH` identifier and exclusive end of the hour containing `now`.
pub fn window_for(now: DateTime<Utc>) -> StoreResult<(String, DateTime<Utc>)> {
    let start = now
        .duration_trunc(ChronoDuration::hours(1))
        .map_err(|e| StoreError::Codec {
            key: KEY_PREFIX.to_string(),
            reason: e.to_string(),
        })?;
    Ok((
        start.format("%Y%m%d%H").to_string(),
        start + ChronoDuration::hours(1),
    ))
}

fn store_key(window_key: &str) -> String {
    format!("{KEY_PREFIX}{window_key}")
}
