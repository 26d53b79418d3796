//! Shared helpers for guard integration tests.
#![allow(dead_code)]

use ai_guard_rust::resilience::backoff::BackoffConfig;
use ai_guard_rust::{Error, GuardConfig, RequestDescriptor, Result};
use futures::future::{BoxFuture, FutureExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn req(content: impl Into<String>) -> RequestDescriptor {
    RequestDescriptor::new(content).with_model("m1")
}

/// Single attempt per call, no jitter.
pub fn single_attempt() -> GuardConfig {
    GuardConfig::default().with_retry(
        BackoffConfig::new()
            .with_max_attempts(1)
            .with_jitter(false),
    )
}

/// Counts how often an operation was actually invoked.
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Operation that sleeps `delay` and then yields the next scripted outcome.
/// The last outcome repeats once the script runs out.
pub fn scripted(
    calls: &Calls,
    delay: Duration,
    script: Vec<Result<String>>,
) -> impl FnMut() -> BoxFuture<'static, Result<String>> + Send + 'static {
    let calls = calls.clone();
    let mut script: VecDeque<Result<String>> = script.into();
    move || {
        calls.bump();
        let outcome = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
        .unwrap_or_else(|| Err(Error::from_message("empty script")));
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            outcome
        }
        .boxed()
    }
}

pub fn ok(calls: &Calls, value: &str) -> impl FnMut() -> BoxFuture<'static, Result<String>> + Send + 'static {
    scripted(calls, Duration::ZERO, vec![Ok(value.to_string())])
}

pub fn slow_ok(
    calls: &Calls,
    delay: Duration,
    value: &str,
) -> impl FnMut() -> BoxFuture<'static, Result<String>> + Send + 'static {
    scripted(calls, delay, vec![Ok(value.to_string())])
}

pub fn failing(calls: &Calls, err: Error) -> impl FnMut() -> BoxFuture<'static, Result<String>> + Send + 'static {
    scripted(calls, Duration::ZERO, vec![Err(err)])
}

/// Paused-clock timers fire on millisecond ticks, so allow a little slack.
pub fn assert_elapsed(started: tokio::time::Instant, expected: Duration) {
    let elapsed = started.elapsed();
    assert!(
        elapsed >= expected && elapsed <= expected + Duration::from_millis(5),
        "elapsed {elapsed:?}, expected about {expected:?}"
    );
}
