//! In-process store backed by `DashMap`.
//!
//! Every operation runs under the shard lock of its key, which makes it
//! linearizable per key for all tasks sharing the same `MemoryStore`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::store::{Clock, Store, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Slot {
    fn new(value: String, now: DateTime<Utc>, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.and_then(|ttl| expiry_after(now, ttl)),
        }
    }

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
}

/// Thread-safe TTL store shared by all components of one process.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, Slot>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Number of stored keys, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop every expired key. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.inner.len();
        self.inner.retain(|_, slot| slot.is_live(now));
        before.saturating_sub(self.inner.len())
    }

    /// Periodically purge expired keys until shutdown.
    pub async fn run_sweeper(self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.inner.len(), "Swept expired store keys");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Store sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = self.clock.now();
        {
            if let Some(slot) = self.inner.get(key) {
                if slot.is_live(now) {
                    return Ok(Some(slot.value.clone()));
                }
            } else {
                return Ok(None);
            }
        }
        self.inner.remove_if(key, |_, slot| !slot.is_live(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()> {
        let now = self.clock.now();
        self.inner
            .insert(key.to_string(), Slot::new(value, now, Some(ttl)));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: String, ttl: Duration) -> StoreResult<bool> {
        let now = self.clock.now();
        match self.inner.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    return Ok(false);
                }
                occupied.insert(Slot::new(value, now, Some(ttl)));
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::new(value, now, Some(ttl)));
                Ok(true)
            }
        }
    }

    async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<u64> {
        let now = self.clock.now();
        match self.inner.entry(key.to_string()) {
            Entry::Occupied(mut occupied) if occupied.get().is_live(now) => {
                let slot = occupied.get_mut();
                let current: u64 = slot.value.parse().map_err(|e| StoreError::Codec {
                    key: key.to_string(),
                    reason: format!("counter is not an integer: {e}"),
                })?;
                let next = current.saturating_add(1);
                slot.value = next.to_string();
                Ok(next)
            }
            Entry::Occupied(mut occupied) => {
                occupied.insert(Slot::new("1".to_string(), now, Some(ttl)));
                Ok(1)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::new("1".to_string(), now, Some(ttl)));
                Ok(1)
            }
        }
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: String,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        let now = self.clock.now();
        match self.inner.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = Some(occupied.get())
                    .filter(|slot| slot.is_live(now))
                    .map(|slot| slot.value.as_str());
                if current != expected {
                    return Ok(false);
                }
                occupied.insert(Slot::new(value, now, ttl));
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                if expected.is_some() {
                    return Ok(false);
                }
                vacant.insert(Slot::new(value, now, ttl));
                Ok(true)
            }
        }
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let now = self.clock.now();
        Ok(self
            .inner
            .remove_if(key, |_, slot| slot.is_live(now) && slot.value == expected)
            .is_some())
    }
}
