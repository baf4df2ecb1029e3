//! Per-city distributed lock.
//!
//! A lock is a store key holding a random owner token. Acquisition is an
//! atomic set-if-absent with expiry; release deletes the key only when the
//! token still matches, so an expired-and-reacquired lock is never freed by
//! its previous owner.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::config::LockConfig;
use crate::store::{Store, StoreResult};

const KEY_PREFIX: &str = "lock:";

/// Proof of ownership returned by a successful acquire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mutual exclusion for upstream fetches of one city.
#[derive(Clone)]
pub struct CityLockManager {
    store: Arc<dyn Store>,
    ttl: Duration,
    wait_min: Duration,
    wait_max: Duration,
}

impl CityLockManager {
    pub fn new(store: Arc<dyn Store>, config: &LockConfig) -> Self {
        Self {
            store,
            ttl: config.ttl(),
            wait_min: Duration::from_millis(config.wait_min_ms),
            wait_max: Duration::from_millis(config.wait_max_ms.max(config.wait_min_ms)),
        }
    }

    /// Configured lock lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Take the lock for `city_key` if nobody holds it.
    pub async fn try_acquire(
        &self,
        city_key: &str,
        ttl: Duration,
    ) -> StoreResult<Option<LockToken>> {
        let token = LockToken::generate();
        let acquired = self
            .store
            .set_if_absent(&lock_key(city_key), token.0.clone(), ttl)
            .await?;
        if acquired {
            tracing::debug!(city = %city_key, token = %token, "Acquired city lock");
            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    /// Release the lock if `token` still owns it. Returns whether it did.
    pub async fn release(&self, city_key: &str, token: &LockToken) -> StoreResult<bool> {
        let released = self
            .store
            .delete_if_equals(&lock_key(city_key), token.as_str())
            .await?;
        if !released {
            tracing::warn!(city = %city_key, "City lock expired before release");
        }
        Ok(released)
    }

    /// Random wait for a contending caller, within the configured bounds.
    pub fn contention_wait(&self) -> Duration {
        let min = self.wait_min.as_millis() as u64;
        let max = self.wait_max.as_millis() as u64;
        Duration::from_millis(fastrand::u64(min..=max))
    }
}

fn lock_key(city_key: &str) -> String {
    format!("{KEY_PREFIX}{city_key}")
}
