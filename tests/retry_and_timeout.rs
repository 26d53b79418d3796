//! Retry with backoff and per-attempt timeouts.

mod common;

use ai_guard_rust::resilience::backoff::BackoffConfig;
use ai_guard_rust::{Error, FailureKind, GuardConfig, ResilientExecutor};
use common::{assert_elapsed, failing, req, scripted, Calls};
use std::time::Duration;
use tokio::time::Instant;

fn guard_with(retry: BackoffConfig) -> ResilientExecutor<String> {
    ResilientExecutor::new("analyze_food", GuardConfig::default().with_retry(retry)).unwrap()
}

fn no_jitter() -> BackoffConfig {
    BackoffConfig::new().with_jitter(false)
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_retried_with_exponential_delay() {
    let guard = guard_with(no_jitter());
    let calls = Calls::new();
    let started = Instant::now();

    let out = guard
        .execute(
            &req("eggs"),
            scripted(
                &calls,
                Duration::ZERO,
                vec![
                    Err(Error::network("connection reset")),
                    Err(Error::remote(502, "bad gateway")),
                    Ok("150 kcal".to_string()),
                ],
            ),
        )
        .await
        .unwrap();

    assert_eq!(out, "150 kcal");
    assert_eq!(calls.count(), 3);
    // 1000ms after the first failure, 2000ms after the second.
    assert_elapsed(started, Duration::from_millis(3000));

    let m = guard.metrics();
    assert_eq!(m.retries, 2);
    assert_eq!(m.executions, 3);
    assert_eq!(m.successes, 1);
    assert_eq!(m.total_failures(), 0);
    assert_eq!(guard.state().consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_cap_counts_total_attempts() {
    let guard = guard_with(no_jitter());
    let calls = Calls::new();

    let err = guard
        .execute(&req("eggs"), failing(&calls, Error::remote(503, "unavailable")))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::ServerError);
    assert_eq!(calls.count(), 3);
    let m = guard.metrics();
    assert_eq!(m.retries, 2);
    assert_eq!(m.failures_of(FailureKind::ServerError), 1);
    // Intermediate failures never reach the circuit.
    assert_eq!(guard.state().consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_failure_is_not_retried() {
    let guard = guard_with(no_jitter());
    let calls = Calls::new();
    let started = Instant::now();

    let err = guard
        .execute(&req("eggs"), failing(&calls, Error::authorization("invalid api key")))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::Authorization);
    assert_eq!(calls.count(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(guard.metrics().retries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_hint_replaces_backoff_delay() {
    // Jitter stays on: a server-suggested wait is used as-is.
    let guard = guard_with(BackoffConfig::new());
    let calls = Calls::new();
    let started = Instant::now();

    let out = guard
        .execute(
            &req("eggs"),
            scripted(
                &calls,
                Duration::ZERO,
                vec![
                    Err(Error::rate_limited("slow down", Some(Duration::from_secs(5)))),
                    Ok("ok".to_string()),
                ],
            ),
        )
        .await
        .unwrap();

    assert_eq!(out, "ok");
    assert_elapsed(started, Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_hint_is_capped_by_max_delay() {
    let guard = guard_with(no_jitter().with_max_delay(Duration::from_secs(2)));
    let calls = Calls::new();
    let started = Instant::now();

    guard
        .execute(
            &req("eggs"),
            scripted(
                &calls,
                Duration::ZERO,
                vec![
                    Err(Error::remote(429, "quota").with_retry_after(Duration::from_secs(60))),
                    Ok("ok".to_string()),
                ],
            ),
        )
        .await
        .unwrap();

    assert_elapsed(started, Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_bounds_every_attempt() {
    let config = GuardConfig::default()
        .with_request_timeout(Duration::from_millis(100))
        .with_retry(
            no_jitter()
                .with_max_attempts(2)
                .with_base_delay(Duration::from_millis(50)),
        );
    let guard: ResilientExecutor<String> = ResilientExecutor::new("transcribe_audio", config).unwrap();
    let calls = Calls::new();
    let started = Instant::now();

    let err = guard
        .execute(
            &req("clip.wav"),
            scripted(&calls, Duration::from_secs(10), vec![Ok("too late".to_string())]),
        )
        .await
        .unwrap_err();

    match err {
        Error::Timeout { timeout_ms } => assert_eq!(timeout_ms, 100),
        other => panic!("expected Timeout, got {other:?}"),
    }
    assert_eq!(calls.count(), 2);
    assert_elapsed(started, Duration::from_millis(250));
    assert_eq!(guard.state().consecutive_failures, 1);
    assert_eq!(guard.signals().cache_entries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unclassified_failures_fail_closed_by_default() {
    let guard = guard_with(no_jitter());
    let calls = Calls::new();

    let err = guard
        .execute(&req("eggs"), failing(&calls, Error::from_message("something odd")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Unclassified);
    assert_eq!(calls.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unclassified_retry_knob_never_trips_circuit() {
    let guard = guard_with(no_jitter().with_retry_unclassified(true));
    let calls = Calls::new();

    for i in 0..6 {
        guard
            .execute(&req(format!("q{i}")), failing(&calls, Error::from_message("something odd")))
            .await
            .unwrap_err();
    }
    assert_eq!(calls.count(), 18);
    assert_eq!(guard.state().consecutive_failures, 0);
    assert_eq!(guard.metrics().failures_of(FailureKind::Unclassified), 6);
}
