use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::event_bus::{EventEmitter, ExecutionEvent};
use crate::core::runtime_context::TimeProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: i64,
    #[serde(default = "default_half_open_success_threshold")]
    pub half_open_success_threshold: u32,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_ms() -> i64 {
    30_000
}

fn default_half_open_success_threshold() -> u32 {
    3
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerConfig {
            failure_threshold: default_failure_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
            half_open_success_threshold: default_half_open_success_threshold(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation; failures are counted.
    Closed,
    /// Failing fast until the reset timeout elapses.
    Open,
    /// Trial calls admitted; successes close, any failure reopens.
    HalfOpen,
}

/// Per-call metrics, kept as running aggregates rather than stored history.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BreakerMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub circuit_open_count: u64,
    pub average_response_time_ms: f64,
}

impl BreakerMetrics {
    fn record(&mut self, success: bool, elapsed_ms: u64) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
        // Running mean, no sample history kept.
        self.average_response_time_ms +=
            (elapsed_ms as f64 - self.average_response_time_ms) / self.total_requests as f64;
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at_ms: Option<i64>,
    half_open_successes: u32,
    metrics: BreakerMetrics,
}

/// Error returned by [`CircuitBreaker::execute`]: either the gate refused the
/// call outright, or the wrapped operation itself failed.
#[derive(Debug, Error)]
pub enum BreakerError<E: std::error::Error> {
    #[error("Circuit breaker is open for integration: {0}")]
    Open(String),
    #[error(transparent)]
    Operation(E),
}

/// Failure-tripped gate in front of one integration. State is owned
/// exclusively by the breaker and mutated only through `execute`/`reset`;
/// concurrent dispatches share it behind a lock.
pub struct CircuitBreaker {
    integration: String,
    config: Mutex<CircuitBreakerConfig>,
    inner: Mutex<BreakerInner>,
    time: Arc<dyn TimeProvider>,
    events: EventEmitter,
}

impl CircuitBreaker {
    pub fn new(
        integration: impl Into<String>,
        config: CircuitBreakerConfig,
        time: Arc<dyn TimeProvider>,
        events: EventEmitter,
    ) -> Self {
        CircuitBreaker {
            integration: integration.into(),
            config: Mutex::new(config),
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at_ms: None,
                half_open_successes: 0,
                metrics: BreakerMetrics::default(),
            }),
            time,
            events,
        }
    }

    pub fn integration(&self) -> &str {
        &self.integration
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn config(&self) -> CircuitBreakerConfig {
        *self.config.lock()
    }

    /// Replace the breaker's configuration at runtime (the self-healer's
    /// protective-profile path). Counters are left untouched.
    pub fn configure(&self, config: CircuitBreakerConfig) {
        *self.config.lock() = config;
    }

    pub fn metrics(&self) -> BreakerMetrics {
        self.inner.lock().metrics
    }

    /// Gate check. While open, the first call after `reset_timeout_ms` has
    /// elapsed transitions the breaker to half-open and is admitted.
    pub fn is_call_permitted(&self) -> bool {
        let config = self.config();
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_at_ms
                    .map(|at| self.time.now_millis() - at)
                    .unwrap_or(i64::MAX);
                if elapsed > config.reset_timeout_ms {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                    tracing::info!(
                        integration = %self.integration,
                        "circuit breaker transitioned to half-open"
                    );
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Run an operation through the breaker. Fails fast with
    /// [`BreakerError::Open`] while the circuit is open; otherwise records
    /// the outcome and drives the state machine.
    pub async fn execute<T, E, F>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        E: std::error::Error,
        F: Future<Output = Result<T, E>>,
    {
        if !self.is_call_permitted() {
            return Err(BreakerError::Open(self.integration.clone()));
        }

        let started = self.time.now_millis();
        let result = operation.await;
        let elapsed_ms = (self.time.now_millis() - started).max(0) as u64;

        match &result {
            Ok(_) => self.on_success(elapsed_ms),
            Err(_) => self.on_failure(elapsed_ms),
        }

        result.map_err(BreakerError::Operation)
    }

    /// Force the breaker back to closed with counters zeroed.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.half_open_successes = 0;
    }

    fn on_success(&self, elapsed_ms: u64) {
        let config = self.config();
        let mut inner = self.inner.lock();
        inner.metrics.record(true, elapsed_ms);

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= config.half_open_success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.half_open_successes = 0;
                    tracing::info!(integration = %self.integration, "circuit breaker closed");
                    self.events.emit(ExecutionEvent::CircuitClosed {
                        integration: self.integration.clone(),
                        timestamp: self.time.now_utc(),
                    });
                }
            }
            CircuitState::Open => {
                tracing::warn!(
                    integration = %self.integration,
                    "success recorded while circuit open"
                );
            }
        }
    }

    fn on_failure(&self, elapsed_ms: u64) {
        let config = self.config();
        let mut inner = self.inner.lock();
        inner.metrics.record(false, elapsed_ms);

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= config.failure_threshold {
                    self.trip(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                // Any half-open failure reopens immediately.
                inner.failure_count += 1;
                self.trip(&mut inner);
            }
            CircuitState::Open => {
                inner.failure_count += 1;
            }
        }
    }

    fn trip(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.last_failure_at_ms = Some(self.time.now_millis());
        inner.half_open_successes = 0;
        inner.metrics.circuit_open_count += 1;
        tracing::warn!(
            integration = %self.integration,
            failure_count = inner.failure_count,
            "circuit breaker opened"
        );
        self.events.emit(ExecutionEvent::CircuitOpened {
            integration: self.integration.clone(),
            failure_count: inner.failure_count,
            timestamp: self.time.now_utc(),
        });
    }
}

/// One breaker per integration, created on first use with the registry's
/// default configuration.
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
    time: Arc<dyn TimeProvider>,
    events: EventEmitter,
}

impl CircuitBreakerRegistry {
    pub fn new(
        default_config: CircuitBreakerConfig,
        time: Arc<dyn TimeProvider>,
        events: EventEmitter,
    ) -> Self {
        CircuitBreakerRegistry {
            breakers: DashMap::new(),
            default_config,
            time,
            events,
        }
    }

    pub fn breaker(&self, integration: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(integration.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    integration,
                    self.default_config,
                    self.time.clone(),
                    self.events.clone(),
                ))
            })
            .clone()
    }

    pub fn get(&self, integration: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(integration).map(|entry| entry.clone())
    }

    /// Apply a configuration to one integration's breaker, creating it if
    /// needed.
    pub fn configure(&self, integration: &str, config: CircuitBreakerConfig) {
        self.breaker(integration).configure(config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::runtime_context::ManualTimeProvider;
    use crate::error::NodeExecutionError;

    fn breaker(threshold: u32) -> (CircuitBreaker, Arc<ManualTimeProvider>) {
        let time = Arc::new(ManualTimeProvider::new(0));
        let breaker = CircuitBreaker::new(
            "stripe",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                reset_timeout_ms: 30_000,
                half_open_success_threshold: 3,
            },
            time.clone(),
            EventEmitter::detached(),
        );
        (breaker, time)
    }

    async fn fail(breaker: &CircuitBreaker) {
        let _ = breaker
            .execute(async {
                Err::<(), _>(NodeExecutionError::Failed("integration down".into()))
            })
            .await;
    }

    async fn succeed(breaker: &CircuitBreaker) {
        let _ = breaker
            .execute(async { Ok::<_, NodeExecutionError>(()) })
            .await;
    }

    #[tokio::test]
    async fn test_trips_at_threshold() {
        let (breaker, _) = breaker(2);
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        let result = breaker
            .execute(async { Ok::<_, NodeExecutionError>(()) })
            .await;
        assert!(matches!(result, Err(BreakerError::Open(_))));
        assert_eq!(breaker.metrics().circuit_open_count, 1);
    }

    #[tokio::test]
    async fn test_success_resets_closed_failure_count() {
        let (breaker, _) = breaker(2);
        fail(&breaker).await;
        succeed(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_recovery() {
        let (breaker, time) = breaker(1);
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        time.advance_millis(30_001);
        assert!(breaker.is_call_permitted());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        succeed(&breaker).await;
        succeed(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        succeed(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics().successful_requests, 3);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let (breaker, time) = breaker(1);
        fail(&breaker).await;
        time.advance_millis(30_001);
        assert!(breaker.is_call_permitted());
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_running_mean_response_time() {
        let (breaker, time) = breaker(10);
        let slow = breaker.execute(async {
            time.advance_millis(100);
            Ok::<_, NodeExecutionError>(())
        });
        slow.await.unwrap();
        let fast = breaker.execute(async {
            time.advance_millis(50);
            Ok::<_, NodeExecutionError>(())
        });
        fast.await.unwrap();
        assert_eq!(breaker.metrics().average_response_time_ms, 75.0);
    }

    #[test]
    fn test_registry_creates_one_breaker_per_integration() {
        let time = Arc::new(ManualTimeProvider::new(0));
        let registry = CircuitBreakerRegistry::new(
            CircuitBreakerConfig::default(),
            time,
            EventEmitter::detached(),
        );
        let a = registry.breaker("stripe");
        let b = registry.breaker("stripe");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.get("hubspot").is_none());
    }
}
