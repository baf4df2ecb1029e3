//! Circuit breaker for the weather provider.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: provider assumed down, requests fail fast
//! - Half-Open: one trial request tests whether the provider recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold, or failure rate over
//!                the trailing window >= rate threshold (with enough samples)
//! Open → Half-Open: lazily, on the first allow_request after reset_timeout
//! Half-Open → Closed: trial succeeds (counters cleared)
//! Half-Open → Open: trial fails (opened_at = now)
//! ```
//!
//! # Design Decisions
//! - One breaker for the single upstream, shared by all instances
//! - The whole state is one store record; every mutation is a compare-and-swap
//! - Single trial in Half-Open; an unreported trial is reclaimable after a timeout

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::store::{Store, StoreError, StoreResult};

const STORE_KEY: &str = "circuit:weather-api";

/// Attempts before a mutation reports contention.
const MAX_CAS_ATTEMPTS: usize = 32;

/// Samples kept in the trailing window regardless of its length.
const MAX_WINDOW_SAMPLES: usize = 1024;

/// Current state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn gauge_value(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Sample {
    at_ms: i64,
    failed: bool,
}

/// Persisted breaker state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
struct BreakerRecord {
    state: CircuitState,
    consecutive_failures: u32,
    samples: Vec<Sample>,
    opened_at: Option<DateTime<Utc>>,
    trial_started_at: Option<DateTime<Utc>>,
}

/// Read-only view for operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub window_samples: usize,
    pub window_failures: usize,
    pub opened_at: Option<DateTime<Utc>>,
    pub trial_started_at: Option<DateTime<Utc>>,
    /// Earliest instant an Open circuit admits a trial.
    pub retry_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
struct Thresholds {
    failure_threshold: u32,
    failure_rate: f64,
    min_samples: usize,
    window: Duration,
    reset_timeout: Duration,
    trial_timeout: Duration,
}

/// Store-backed circuit breaker.
#[derive(Clone)]
pub struct CircuitBreaker {
    store: Arc<dyn Store>,
    thresholds: Thresholds,
}

type Transition = Option<(CircuitState, CircuitState)>;

impl CircuitBreaker {
    pub fn new(store: Arc<dyn Store>, config: &CircuitBreakerConfig) -> Self {
        Self {
            store,
            thresholds: Thresholds {
                failure_threshold: config.failure_threshold,
                failure_rate: config.failure_rate_threshold,
                min_samples: config.min_requests_in_window as usize,
                window: Duration::seconds(config.rate_window_secs as i64),
                reset_timeout: Duration::seconds(config.reset_timeout_secs as i64),
                trial_timeout: Duration::seconds(config.trial_timeout_secs as i64),
            },
        }
    }

    /// Whether an upstream call may proceed now.
    ///
    /// In Half-Open, a `true` result claims the single trial slot.
    pub async fn allow_request(&self, now: DateTime<Utc>) -> StoreResult<bool> {
        let t = self.thresholds;
        self.update(|record| match record.state {
            CircuitState::Closed => (true, None),
            CircuitState::Open => {
                let ready = record
                    .opened_at
                    .map_or(true, |opened| now >= opened + t.reset_timeout);
                if ready {
                    record.state = CircuitState::HalfOpen;
                    record.trial_started_at = Some(now);
                    (true, Some((CircuitState::Open, CircuitState::HalfOpen)))
                } else {
                    (false, None)
                }
            }
            CircuitState::HalfOpen => {
                let slot_free = record
                    .trial_started_at
                    .map_or(true, |started| now >= started + t.trial_timeout);
                if slot_free {
                    if record.trial_started_at.is_some() {
                        tracing::warn!("Previous breaker trial abandoned, reclaiming slot");
                    }
                    record.trial_started_at = Some(now);
                    (true, None)
                } else {
                    (false, None)
                }
            }
        })
        .await
    }

    /// Report a successful upstream call.
    pub async fn record_success(&self, now: DateTime<Utc>) -> StoreResult<()> {
        let t = self.thresholds;
        self.update(|record| match record.state {
            CircuitState::Closed => {
                record.consecutive_failures = 0;
                record.push_sample(now, false, t.window);
                ((), None)
            }
            CircuitState::HalfOpen => {
                *record = BreakerRecord::default();
                ((), Some((CircuitState::HalfOpen, CircuitState::Closed)))
            }
            CircuitState::Open => ((), None),
        })
        .await
    }

    /// Report a failed upstream call.
    pub async fn record_failure(&self, now: DateTime<Utc>) -> StoreResult<()> {
        let t = self.thresholds;
        self.update(|record| match record.state {
            CircuitState::Closed => {
                record.consecutive_failures = record.consecutive_failures.saturating_add(1);
                record.push_sample(now, true, t.window);

                let (samples, failures) = record.window_counts();
                let rate_tripped = samples >= t.min_samples
                    && samples > 0
                    && failures as f64 / samples as f64 >= t.failure_rate;
                if record.consecutive_failures >= t.failure_threshold || rate_tripped {
                    tracing::warn!(
                        consecutive_failures = record.consecutive_failures,
                        window_samples = samples,
                        window_failures = failures,
                        "Circuit breaker tripped"
                    );
                    record.open(now);
                    ((), Some((CircuitState::Closed, CircuitState::Open)))
                } else {
                    ((), None)
                }
            }
            CircuitState::HalfOpen => {
                record.open(now);
                ((), Some((CircuitState::HalfOpen, CircuitState::Open)))
            }
            CircuitState::Open => ((), None),
        })
        .await
    }

    /// Current state without side effects.
    pub async fn snapshot(&self) -> StoreResult<BreakerSnapshot> {
        let record = self.load().await?.1;
        let (window_samples, window_failures) = record.window_counts();
        Ok(BreakerSnapshot {
            state: record.state,
            consecutive_failures: record.consecutive_failures,
            window_samples,
            window_failures,
            opened_at: record.opened_at,
            trial_started_at: record.trial_started_at,
            retry_after: match record.state {
                CircuitState::Open => record.opened_at.map(|at| at + self.thresholds.reset_timeout),
                _ => None,
            },
        })
    }

    async fn load(&self) -> StoreResult<(Option<String>, BreakerRecord)> {
        let raw = self.store.get(STORE_KEY).await?;
        let record = match &raw {
            Some(text) => serde_json::from_str(text).map_err(|e| StoreError::Codec {
                key: STORE_KEY.to_string(),
                reason: e.to_string(),
            })?,
            None => BreakerRecord::default(),
        };
        Ok((raw, record))
    }

    /// Read-modify-CAS loop. `mutate` may run more than once.
    async fn update<R, F>(&self, mut mutate: F) -> StoreResult<R>
    where
        F: FnMut(&mut BreakerRecord) -> (R, Transition),
    {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let (raw, mut record) = self.load().await?;
            let before = record.clone();
            let (result, transition) = mutate(&mut record);
            if record == before {
                return Ok(result);
            }

            let encoded = serde_json::to_string(&record).map_err(|e| StoreError::Codec {
                key: STORE_KEY.to_string(),
                reason: e.to_string(),
            })?;
            if self
                .store
                .compare_and_swap(STORE_KEY, raw.as_deref(), encoded, None)
                .await?
            {
                if let Some((from, to)) = transition {
                    tracing::info!(from = ?from, to = ?to, "Circuit breaker state change");
                    metrics::set_circuit_state(to.gauge_value());
                }
                return Ok(result);
            }
            tokio::task::yield_now().await;
        }
        Err(StoreError::Contention(STORE_KEY.to_string()))
    }
}

impl BreakerRecord {
    fn push_sample(&mut self, now: DateTime<Utc>, failed: bool, window: Duration) {
        let cutoff = (now - window).timestamp_millis();
        self.samples.retain(|s| s.at_ms > cutoff);
        self.samples.push(Sample {
            at_ms: now.timestamp_millis(),
            failed,
        });
        if self.samples.len() > MAX_WINDOW_SAMPLES {
            let excess = self.samples.len() - MAX_WINDOW_SAMPLES;
            self.samples.drain(..excess);
        }
    }

    fn window_counts(&self) -> (usize, usize) {
        let failures = self.samples.iter().filter(|s| s.failed).count();
        (self.samples.len(), failures)
    }

    fn open(&mut self, now: DateTime<Utc>) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.trial_started_at = None;
        self.consecutive_failures = 0;
        self.samples.clear();
    }
}
