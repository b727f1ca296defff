use super::*;
use crate::classifier::ErrorClassifier;
use fleet_core::FakeClock;
use std::sync::atomic::{AtomicU32, Ordering};

fn engine(config: RetryPolicyConfig) -> AdaptiveRetry {
    AdaptiveRetry::new(config, Arc::new(ErrorClassifier::new()), Arc::new(FakeClock::new()))
}

fn fast_config() -> RetryPolicyConfig {
    RetryPolicyConfig {
        max_attempts: 4,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(50),
        strategy: BackoffStrategy::Fixed,
        jitter: None,
        ..RetryPolicyConfig::default()
    }
}

#[tokio::test]
async fn succeeds_immediately_without_retrying() {
    let engine = engine(fast_config());
    let ctx = RetryContext::new(ErrorKind::Network);
    let calls = AtomicU32::new(0);
    let result: Result<u32, String> = engine
        .retry_with_backoff(&ctx, |_ctx, _attempt| {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Ok(7) }
        })
        .await;
    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn retries_a_retryable_error_until_it_succeeds() {
    let engine = engine(fast_config());
    let ctx = RetryContext::new(ErrorKind::Network);
    let calls = AtomicU32::new(0);
    let result = engine
        .retry_with_backoff(&ctx, |_ctx, _attempt| {
            let n = calls.fetch_add(1, Ordering::Relaxed);
            async move {
                if n < 2 {
                    Err("connection refused".to_string())
                } else {
                    Ok::<_, String>(42)
                }
            }
        })
        .await;
    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::Relaxed), 3);
}

#[tokio::test]
async fn a_non_retryable_error_returns_immediately_without_further_attempts() {
    let engine = engine(fast_config());
    let ctx = RetryContext::new(ErrorKind::Auth);
    let calls = AtomicU32::new(0);
    let result: Result<(), String> = engine
        .retry_with_backoff(&ctx, |_ctx, _attempt| {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Err("permission denied".to_string()) }
        })
        .await;
    assert!(matches!(result.unwrap_err(), ResilienceError::NotRetryable { .. }));
    assert_eq!(calls.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn exhausting_every_attempt_returns_exhausted() {
    let engine = engine(fast_config());
    let ctx = RetryContext::new(ErrorKind::Network);
    let calls = AtomicU32::new(0);
    let result: Result<(), String> = engine
        .retry_with_backoff(&ctx, |_ctx, _attempt| {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Err("connection refused".to_string()) }
        })
        .await;
    match result.unwrap_err() {
        ResilienceError::Exhausted { attempts, .. } => assert_eq!(attempts, 4),
        other => panic!("expected Exhausted, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::Relaxed), 4);
}

#[tokio::test]
async fn cancellation_stops_retries_early() {
    let engine = engine(RetryPolicyConfig {
        max_attempts: 10,
        base_delay: Duration::from_millis(20),
        ..fast_config()
    });
    let cancel = CancelScope::root();
    let ctx = RetryContext::with_cancel(ErrorKind::Network, cancel.clone());
    let calls = AtomicU32::new(0);
    let cancel_after = 2;

    let result: Result<(), String> = engine
        .retry_with_backoff(&ctx, |_ctx, _attempt| {
            let n = calls.fetch_add(1, Ordering::Relaxed) + 1;
            if n == cancel_after {
                cancel.cancel();
            }
            async { Err("connection refused".to_string()) }
        })
        .await;
    assert!(matches!(result.unwrap_err(), ResilienceError::Cancelled));
}

#[test]
fn fixed_backoff_always_returns_the_base_delay() {
    let delay = backoff_delay(BackoffStrategy::Fixed, 5, Duration::from_millis(100), Duration::from_secs(5), Duration::from_millis(100), 1.0);
    assert_eq!(delay, Duration::from_millis(100));
}

#[test]
fn exponential_backoff_doubles_and_then_clamps_to_max() {
    let base = Duration::from_millis(100);
    let max = Duration::from_millis(350);
    assert_eq!(backoff_delay(BackoffStrategy::Exponential, 2, base, max, base, 1.0), Duration::from_millis(200));
    assert_eq!(backoff_delay(BackoffStrategy::Exponential, 3, base, max, base, 1.0), Duration::from_millis(350));
}

#[test]
fn linear_backoff_scales_with_attempt_number() {
    let base = Duration::from_millis(50);
    let max = Duration::from_secs(5);
    assert_eq!(backoff_delay(BackoffStrategy::Linear, 3, base, max, base, 1.0), Duration::from_millis(150));
}

#[test]
fn decorrelated_jitter_stays_within_its_bounds() {
    let base = Duration::from_millis(100);
    let max = Duration::from_secs(5);
    for _ in 0..50 {
        let delay = backoff_delay(BackoffStrategy::DecorrelatedJitter, 4, base, max, base, 1.0);
        assert!(delay >= base);
        assert!(delay <= base.saturating_mul(3));
    }
}
