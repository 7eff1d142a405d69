use std::sync::Arc;

use flowrun::{
    BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState, EventEmitter,
    ManualTimeProvider, NodeExecutionError, RateLimitConfig, RateLimiter,
};

fn breaker_with_clock(config: CircuitBreakerConfig) -> (CircuitBreaker, Arc<ManualTimeProvider>) {
    let time = Arc::new(ManualTimeProvider::new(0));
    let breaker = CircuitBreaker::new("stripe", config, time.clone(), EventEmitter::detached());
    (breaker, time)
}

async fn fail(breaker: &CircuitBreaker) -> bool {
    breaker
        .execute(async { Err::<(), _>(NodeExecutionError::Failed("boom".into())) })
        .await
        .is_err()
}

async fn succeed(breaker: &CircuitBreaker) {
    breaker
        .execute(async { Ok::<_, NodeExecutionError>(()) })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_full_breaker_lifecycle() {
    let (breaker, time) = breaker_with_clock(CircuitBreakerConfig {
        failure_threshold: 5,
        reset_timeout_ms: 30_000,
        half_open_success_threshold: 3,
    });

    // Five consecutive failures trip the breaker.
    for _ in 0..4 {
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
    fail(&breaker).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    // While open, calls fail fast without reaching the operation.
    let result = breaker
        .execute(async { Ok::<_, NodeExecutionError>("unreachable") })
        .await;
    assert!(matches!(result, Err(BreakerError::Open(ref i)) if i == "stripe"));
    assert_eq!(breaker.metrics().circuit_open_count, 1);

    // After the reset timeout the next call probes in half-open.
    time.advance_millis(30_001);
    assert!(breaker.is_call_permitted());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    // Three consecutive successes close the breaker with counters zeroed.
    succeed(&breaker).await;
    succeed(&breaker).await;
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    succeed(&breaker).await;
    assert_eq!(breaker.state(), CircuitState::Closed);

    // Counters were zeroed: it takes the full threshold to trip again.
    for _ in 0..4 {
        fail(&breaker).await;
    }
    assert_eq!(breaker.state(), CircuitState::Closed);
    fail(&breaker).await;
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn test_half_open_failure_reopens_immediately() {
    let (breaker, time) = breaker_with_clock(CircuitBreakerConfig {
        failure_threshold: 1,
        reset_timeout_ms: 30_000,
        half_open_success_threshold: 3,
    });

    fail(&breaker).await;
    time.advance_millis(30_001);
    assert!(breaker.is_call_permitted());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    fail(&breaker).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    // The reset timer restarts from the half-open failure.
    time.advance_millis(15_000);
    assert!(!breaker.is_call_permitted());
    time.advance_millis(15_001);
    assert!(breaker.is_call_permitted());
}

#[tokio::test]
async fn test_breaker_metrics_running_mean() {
    let (breaker, time) = breaker_with_clock(CircuitBreakerConfig::default());

    breaker
        .execute(async {
            time.advance_millis(200);
            Ok::<_, NodeExecutionError>(())
        })
        .await
        .unwrap();
    let _ = breaker
        .execute(async {
            time.advance_millis(100);
            Err::<(), _>(NodeExecutionError::Failed("boom".into()))
        })
        .await;

    let metrics = breaker.metrics();
    assert_eq!(metrics.total_requests, 2);
    assert_eq!(metrics.successful_requests, 1);
    assert_eq!(metrics.failed_requests, 1);
    assert_eq!(metrics.average_response_time_ms, 150.0);
}

#[tokio::test]
async fn test_manual_reset_closes_breaker() {
    let (breaker, _) = breaker_with_clock(CircuitBreakerConfig {
        failure_threshold: 1,
        reset_timeout_ms: 30_000,
        half_open_success_threshold: 3,
    });
    fail(&breaker).await;
    assert_eq!(breaker.state(), CircuitState::Open);
    breaker.reset();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert!(breaker.is_call_permitted());
}

#[test]
fn test_rate_window_lifecycle() {
    let time = Arc::new(ManualTimeProvider::new(0));
    let limiter = RateLimiter::new(
        RateLimitConfig {
            window_ms: 60_000,
            max_requests: 3,
        },
        time.clone(),
    );

    // The predicate alone never consumes the window.
    for _ in 0..10 {
        assert!(limiter.can_make_request("ws", "exec"));
    }

    limiter.record_request("ws", "exec");
    limiter.record_request("ws", "exec");
    limiter.record_request("ws", "exec");
    assert!(!limiter.can_make_request("ws", "exec"));
    assert_eq!(limiter.usage("ws", "exec"), (3, 3));

    // Partial elapse changes nothing; the reset is whole-window and lazy.
    time.advance_millis(59_999);
    assert!(!limiter.can_make_request("ws", "exec"));
    time.advance_millis(1);
    assert!(limiter.can_make_request("ws", "exec"));
    assert_eq!(limiter.usage("ws", "exec"), (0, 3));

    limiter.record_request("ws", "exec");
    assert_eq!(limiter.usage("ws", "exec"), (1, 3));
}

#[test]
fn test_rate_limits_are_per_resource() {
    let time = Arc::new(ManualTimeProvider::new(0));
    let limiter = RateLimiter::new(
        RateLimitConfig {
            window_ms: 60_000,
            max_requests: 1,
        },
        time,
    );
    limiter.record_request("ws", "workflow_executions");
    assert!(!limiter.can_make_request("ws", "workflow_executions"));
    assert!(limiter.can_make_request("ws", "webhook_deliveries"));
}
