//! Per-request state machine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::instrument;

use crate::cache::WeatherCache;
use crate::config::GatewayConfig;
use crate::lock::{CityLockManager, LockToken};
use crate::observability::metrics;
use crate::orchestrator::outcome::{DataSource, FallbackReason, QueryOutcome};
use crate::resilience::{CircuitBreaker, Deadline, HourlyRateLimiter};
use crate::store::{Clock, Store};
use crate::upstream::{transform, FetchError, ForecastSource};
use crate::weather::WeatherRecord;

/// Stages of one query. Each request walks these exactly once to `Done`.
#[derive(Debug)]
enum Step {
    CheckCache,
    AcquireLock,
    WaitAndRecheck,
    CheckLimiter(LockToken),
    CheckBreaker(LockToken),
    Fetch(LockToken),
    Fallback(FallbackReason),
    Done(QueryOutcome),
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::CheckCache => "check_cache",
            Step::AcquireLock => "acquire_lock",
            Step::WaitAndRecheck => "wait_and_recheck",
            Step::CheckLimiter(_) => "check_limiter",
            Step::CheckBreaker(_) => "check_breaker",
            Step::Fetch(_) => "fetch",
            Step::Fallback(_) => "fallback",
            Step::Done(_) => "done",
        }
    }
}

/// Composes cache, lock, limiter, breaker and provider into one query.
///
/// Owns no state of its own; everything lives in the shared store.
#[derive(Clone)]
pub struct Orchestrator {
    cache: WeatherCache,
    limiter: HourlyRateLimiter,
    breaker: CircuitBreaker,
    locks: CityLockManager,
    source: Arc<dyn ForecastSource>,
    clock: Arc<dyn Clock>,
    expiry_buffer: chrono::Duration,
    request_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        config: &GatewayConfig,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        source: Arc<dyn ForecastSource>,
    ) -> Self {
        Self {
            cache: WeatherCache::new(store.clone(), &config.cache),
            limiter: HourlyRateLimiter::new(store.clone(), &config.rate_limit),
            breaker: CircuitBreaker::new(store.clone(), &config.circuit_breaker),
            locks: CityLockManager::new(store, &config.lock),
            source,
            clock,
            expiry_buffer: config.cache.expiry_buffer(),
            request_timeout: config.timeouts.request(),
        }
    }

    pub fn cache(&self) -> &WeatherCache {
        &self.cache
    }

    pub fn limiter(&self) -> &HourlyRateLimiter {
        &self.limiter
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Answer a query for an already-normalized city key.
    ///
    /// Never fails: every error becomes a stale or unavailable outcome.
    #[instrument(skip(self), fields(city = %city_key))]
    pub async fn query(&self, city_key: &str) -> QueryOutcome {
        let deadline = Deadline::after(self.request_timeout);
        let mut step = Step::CheckCache;

        loop {
            tracing::trace!(stage = step.name(), "Orchestrator step");
            step = match step {
                Step::CheckCache => self.check_cache(city_key).await,
                Step::AcquireLock => self.acquire_lock(city_key).await,
                Step::WaitAndRecheck => self.wait_and_recheck(city_key, &deadline).await,
                Step::CheckLimiter(token) => self.check_limiter(city_key, token).await,
                Step::CheckBreaker(token) => self.check_breaker(city_key, token).await,
                Step::Fetch(token) => self.fetch(city_key, token, &deadline).await,
                Step::Fallback(reason) => self.fallback(city_key, reason).await,
                Step::Done(outcome) => return outcome,
            };
        }
    }

    async fn check_cache(&self, city_key: &str) -> Step {
        match self.cache.get(city_key, self.clock.now()).await {
            Ok(Some(record)) => {
                metrics::record_cache_lookup("hit");
                Step::Done(QueryOutcome::fresh(DataSource::Cached, record))
            }
            Ok(None) => {
                metrics::record_cache_lookup("miss");
                Step::AcquireLock
            }
            Err(e) => {
                metrics::record_cache_lookup("error");
                infrastructure("check_cache", e)
            }
        }
    }

    async fn acquire_lock(&self, city_key: &str) -> Step {
        match self.locks.try_acquire(city_key, self.locks.ttl()).await {
            Ok(Some(token)) => self.recheck_after_lock(city_key, token).await,
            Ok(None) => {
                metrics::record_lock_contention();
                Step::WaitAndRecheck
            }
            Err(e) => infrastructure("acquire_lock", e),
        }
    }

    /// Another holder may have filled the cache between our miss and the
    /// acquire; only fetch if it is still empty.
    async fn recheck_after_lock(&self, city_key: &str, token: LockToken) -> Step {
        match self.cache.get(city_key, self.clock.now()).await {
            Ok(Some(record)) => {
                self.release(city_key, &token).await;
                Step::Done(QueryOutcome::fresh(DataSource::Cached, record))
            }
            Ok(None) => Step::CheckLimiter(token),
            Err(e) => {
                self.release(city_key, &token).await;
                infrastructure("recheck_after_lock", e)
            }
        }
    }

    async fn wait_and_recheck(&self, city_key: &str, deadline: &Deadline) -> Step {
        let wait = self.locks.contention_wait();
        tracing::debug!(wait_ms = wait.as_millis() as u64, "City lock held elsewhere, waiting");
        deadline.sleep_clipped(wait).await;

        match self.cache.get(city_key, self.clock.now()).await {
            Ok(Some(record)) => Step::Done(QueryOutcome::fresh(DataSource::Cached, record)),
            Ok(None) => Step::Fallback(FallbackReason::LockContended),
            Err(e) => infrastructure("wait_and_recheck", e),
        }
    }

    async fn check_limiter(&self, city_key: &str, token: LockToken) -> Step {
        match self.limiter.allow_request(self.clock.now()).await {
            Ok(true) => Step::CheckBreaker(token),
            Ok(false) => {
                metrics::record_rate_limited();
                self.release(city_key, &token).await;
                Step::Fallback(FallbackReason::RateLimited)
            }
            Err(e) => {
                self.release(city_key, &token).await;
                infrastructure("check_limiter", e)
            }
        }
    }

    async fn check_breaker(&self, city_key: &str, token: LockToken) -> Step {
        match self.breaker.allow_request(self.clock.now()).await {
            Ok(true) => Step::Fetch(token),
            Ok(false) => {
                self.release(city_key, &token).await;
                Step::Fallback(FallbackReason::CircuitOpen)
            }
            Err(e) => {
                self.release(city_key, &token).await;
                infrastructure("check_breaker", e)
            }
        }
    }

    /// Run the fetch as a detached task so a missed deadline does not
    /// abandon the lock, the breaker outcome or the cache write.
    async fn fetch(&self, city_key: &str, token: LockToken, deadline: &Deadline) -> Step {
        let this = self.clone();
        let key = city_key.to_string();
        let task = tokio::spawn(async move { this.fetch_and_store(key, token).await });

        match deadline.run(task).await {
            Ok(Ok(Ok(record))) => Step::Done(QueryOutcome::fresh(DataSource::Live, record)),
            Ok(Ok(Err(e))) => Step::Fallback(FallbackReason::UpstreamFailed(e)),
            Ok(Err(join_err)) => {
                tracing::error!(error = %join_err, "Fetch task failed");
                Step::Fallback(FallbackReason::Infrastructure(format!(
                    "fetch task failed: {join_err}"
                )))
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "Request deadline passed, fetch continues in background"
                );
                Step::Fallback(FallbackReason::Timeout)
            }
        }
    }

    async fn fetch_and_store(
        self,
        city_key: String,
        token: LockToken,
    ) -> Result<WeatherRecord, FetchError> {
        let started = Instant::now();
        let result = self
            .source
            .fetch(&city_key)
            .await
            .and_then(|raw| transform(&raw));
        metrics::record_upstream_duration(started.elapsed());

        let now = self.clock.now();
        let outcome = match result {
            Ok(payload) => {
                if let Err(e) = self.breaker.record_success(now).await {
                    tracing::warn!(error = %e, "Failed to record breaker success");
                }
                let record = WeatherRecord::new(&city_key, payload, now, self.expiry_buffer);
                if let Err(e) = self.cache.put(&city_key, &record, now).await {
                    tracing::warn!(error = %e, "Cache write failed, serving live data uncached");
                }
                tracing::info!(expires_at = %record.expires_at, "Fetched live forecast");
                Ok(record)
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    transient = err.is_transient(),
                    "Upstream fetch failed"
                );
                if let Err(e) = self.breaker.record_failure(now).await {
                    tracing::warn!(error = %e, "Failed to record breaker failure");
                }
                Err(err)
            }
        };

        self.release(&city_key, &token).await;
        outcome
    }

    async fn fallback(&self, city_key: &str, reason: FallbackReason) -> Step {
        metrics::record_fallback(reason.label());
        match self.cache.get_stale(city_key).await {
            Ok(Some(record)) => {
                tracing::info!(reason = reason.code(), "Serving stale forecast");
                Step::Done(QueryOutcome::stale(record, &reason))
            }
            Ok(None) => {
                tracing::info!(reason = reason.code(), "No forecast available");
                Step::Done(QueryOutcome::Unavailable {
                    city_key: city_key.to_string(),
                    reason,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, reason = reason.code(), "Stale lookup failed");
                Step::Done(QueryOutcome::Unavailable {
                    city_key: city_key.to_string(),
                    reason,
                })
            }
        }
    }

    async fn release(&self, city_key: &str, token: &LockToken) {
        if let Err(e) = self.locks.release(city_key, token).await {
            tracing::warn!(error = %e, "Failed to release city lock, it will expire");
        }
    }
}

fn infrastructure(stage: &'static str, err: crate::store::StoreError) -> Step {
    tracing::error!(stage, error = %err, "Store error");
    Step::Fallback(FallbackReason::Infrastructure(err.to_string()))
}
