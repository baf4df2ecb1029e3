//! Forecast cache.
//!
//! Records are stored as JSON under `weather:{city_key}`. The physical key
//! lives `stale_retention` past the record's logical expiry, which is what
//! makes `get_stale` possible after `get` stops returning the record.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::CacheConfig;
use crate::store::{Store, StoreError, StoreResult};
use crate::weather::WeatherRecord;

const KEY_PREFIX: &str = "weather:";

/// Cache of one `WeatherRecord` per city.
#[derive(Clone)]
pub struct WeatherCache {
    store: Arc<dyn Store>,
    stale_retention: Duration,
}

impl WeatherCache {
    pub fn new(store: Arc<dyn Store>, config: &CacheConfig) -> Self {
        Self {
            store,
            stale_retention: config.stale_retention(),
        }
    }

    /// The record for `city_key` if it is still fresh at `now`.
    pub async fn get(
        &self,
        city_key: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<WeatherRecord>> {
        Ok(self
            .get_stale(city_key)
            .await?
            .filter(|record| record.is_fresh(now)))
    }

    /// The record for `city_key` regardless of freshness.
    pub async fn get_stale(&self, city_key: &str) -> StoreResult<Option<WeatherRecord>> {
        let key = cache_key(city_key);
        match self.store.get(&key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StoreError::Codec {
                    key,
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Overwrite the record for `city_key`.
    pub async fn put(
        &self,
        city_key: &str,
        record: &WeatherRecord,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let key = cache_key(city_key);
        let encoded = serde_json::to_string(record).map_err(|e| StoreError::Codec {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        let until_expiry = (record.expires_at - now).to_std().unwrap_or_default();
        let ttl = until_expiry + self.stale_retention;

        self.store.set(&key, encoded, ttl).await?;
        tracing::debug!(
            city = %city_key,
            expires_at = %record.expires_at,
            ttl_secs = ttl.as_secs(),
            "Cached forecast"
        );
        Ok(())
    }
}

fn cache_key(city_key: &str) -> String {
    format!("{KEY_PREFIX}{city_key}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Clock, ManualClock, MemoryStore};
    use crate::upstream::{transform, types::fixtures};
    use chrono::TimeZone;

    fn setup() -> (WeatherCache, Arc<ManualClock>, Arc<dyn Store>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 15, 0, 0).unwrap(),
        ));
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new(clock.clone()));
        (
            WeatherCache::new(store.clone(), &CacheConfig::default()),
            clock,
            store,
        )
    }

    fn record(city: &str, at: DateTime<Utc>) -> WeatherRecord {
        let payload = transform(&fixtures::forecast("Paris", "FR")).unwrap();
        WeatherRecord::new(city, payload, at, chrono::Duration::minutes(5))
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (cache, clock, _) = setup();
        assert!(cache.get("paris", clock.now()).await.unwrap().is_none());

        let rec = record("paris", clock.now());
        cache.put("paris", &rec, clock.now()).await.unwrap();

        assert_eq!(cache.get("paris", clock.now()).await.unwrap(), Some(rec));
    }

    #[tokio::test]
    async fn test_expired_record_is_stale_only() {
        let (cache, clock, _) = setup();
        let rec = record("paris", clock.now());
        cache.put("paris", &rec, clock.now()).await.unwrap();

        // Fresh until 00:05 the next day
        clock.set(Utc.with_ymd_and_hms(2024, 5, 2, 0, 4, 59).unwrap());
        assert!(cache.get("paris", clock.now()).await.unwrap().is_some());

        clock.set(Utc.with_ymd_and_hms(2024, 5, 2, 0, 5, 0).unwrap());
        assert!(cache.get("paris", clock.now()).await.unwrap().is_none());
        assert_eq!(cache.get_stale("paris").await.unwrap(), Some(rec));
    }

    #[tokio::test]
    async fn test_stale_retention_bounds_physical_lifetime() {
        let (cache, clock, _) = setup();
        let rec = record("paris", clock.now());
        cache.put("paris", &rec, clock.now()).await.unwrap();

        clock.set(rec.expires_at + chrono::Duration::hours(47));
        assert!(cache.get_stale("paris").await.unwrap().is_some());

        clock.set(rec.expires_at + chrono::Duration::hours(48));
        assert!(cache.get_stale("paris").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (cache, clock, _) = setup();
        let first = record("paris", clock.now());
        cache.put("paris", &first, clock.now()).await.unwrap();

        clock.advance(chrono::Duration::hours(1));
        let second = record("paris", clock.now());
        cache.put("paris", &second, clock.now()).await.unwrap();
        cache.put("paris", &second, clock.now()).await.unwrap();

        let got = cache.get("paris", clock.now()).await.unwrap().unwrap();
        assert_eq!(got.fetched_at, second.fetched_at);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_codec_error() {
        let (cache, _, store) = setup();
        store
            .set("weather:paris", "{".into(), Duration::from_secs(60))
            .await
            .unwrap();
        let err = cache.get_stale("paris").await.unwrap_err();
        assert!(matches!(err, StoreError::Codec { .. }));
    }
}
