use super::*;
use fleet_core::FakeClock;
use fleet_metrics::MetricsRegistry;

fn breaker(config: CircuitBreakerConfig) -> (CircuitBreaker, Arc<FakeClock>) {
    let clock = Arc::new(FakeClock::new());
    let breaker = CircuitBreaker::new(config, clock.clone(), MetricsRegistry::new());
    (breaker, clock)
}

fn small_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        request_volume_threshold: 4,
        error_percentage_threshold: 50.0,
        failure_threshold: 10,
        success_threshold: 2,
        recovery_timeout: Duration::from_secs(5),
        bucket_duration: Duration::from_secs(6),
    }
}

#[test]
fn closed_circuit_always_allows() {
    let (breaker, _clock) = breaker(CircuitBreakerConfig::default());
    assert!(breaker.allow());
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[test]
fn trips_open_once_volume_and_error_rate_thresholds_are_crossed() {
    let (breaker, _clock) = breaker(small_config());
    for _ in 0..2 {
        breaker.record_success();
    }
    for _ in 0..2 {
        breaker.record_failure();
    }
    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(!breaker.allow());
}

#[test]
fn consecutive_failures_alone_can_trip_the_circuit() {
    let mut config = small_config();
    config.request_volume_threshold = 4;
    config.error_percentage_threshold = 90.0;
    config.failure_threshold = 3;
    let (breaker, _clock) = breaker(config);
    breaker.record_success();
    for _ in 0..3 {
        breaker.record_failure();
    }
    // 3/4 = 75% error rate, below the 90% threshold, so only the
    // consecutive-failure path can have tripped this.
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[test]
fn open_circuit_transitions_to_half_open_after_recovery_timeout() {
    let (breaker, clock) = breaker(small_config());
    for _ in 0..4 {
        breaker.record_failure();
    }
    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(!breaker.allow());

    clock.advance(Duration::from_secs(6));
    assert!(breaker.allow());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

#[test]
fn half_open_closes_after_enough_consecutive_successes() {
    let (breaker, clock) = breaker(small_config());
    for _ in 0..4 {
        breaker.record_failure();
    }
    clock.advance(Duration::from_secs(6));
    assert!(breaker.allow());
    breaker.record_success();
    breaker.record_success();
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[test]
fn half_open_reopens_on_a_single_failure() {
    let (breaker, clock) = breaker(small_config());
    for _ in 0..4 {
        breaker.record_failure();
    }
    clock.advance(Duration::from_secs(6));
    assert!(breaker.allow());
    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[test]
fn reset_returns_to_closed_with_cleared_counters() {
    let (breaker, _clock) = breaker(small_config());
    for _ in 0..4 {
        breaker.record_failure();
    }
    assert_eq!(breaker.state(), CircuitState::Open);
    breaker.reset();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert!(breaker.allow());
}

#[test]
fn buckets_outside_the_one_minute_window_do_not_count_toward_tripping() {
    let mut config = small_config();
    config.request_volume_threshold = 3;
    config.error_percentage_threshold = 10.0;
    config.failure_threshold = 100;
    let (breaker, clock) = breaker(config);
    breaker.record_success();
    breaker.record_success();
    // 70s later every old bucket has rotated out of the 60s window, so the
    // single failure below sees a window of 1 request, not 3.
    clock.advance(Duration::from_secs(70));
    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::Closed);
}
