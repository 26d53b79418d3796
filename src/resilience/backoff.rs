use crate::error_code::FailureKind;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for guarded operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    #[serde(rename = "base_delay_ms", with = "crate::config::duration_ms")]
    pub base_delay: Duration,
    pub multiplier: f64,
    #[serde(rename = "max_delay_ms", with = "crate::config::duration_ms")]
    pub max_delay: Duration,
    /// Apply ±25% uniform jitter to computed delays.
    pub jitter: bool,
    /// Retry unclassified failures (still capped, still never trip the circuit).
    pub retry_unclassified: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            max_delay: Duration::from_millis(30_000),
            jitter: true,
            retry_unclassified: false,
        }
    }
}

impl BackoffConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
    pub fn with_retry_unclassified(mut self, retry: bool) -> Self {
        self.retry_unclassified = retry;
        self
    }
}

/// Decision after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry { delay: Duration },
    Fail,
}

pub const JITTER_MIN: f64 = 0.75;
pub const JITTER_MAX: f64 = 1.25;

/// Classifies failures and computes retry delays.
#[derive(Debug, Clone, Default)]
pub struct BackoffScheduler {
    cfg: BackoffConfig,
}

impl BackoffScheduler {
    pub fn new(cfg: BackoffConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.cfg
    }

    /// Whether `err` may be retried locally.
    pub fn classify(&self, err: &Error) -> bool {
        match err.kind() {
            FailureKind::Unclassified => self.cfg.retry_unclassified,
            kind => kind.retryable(),
        }
    }

    /// `min(max_delay, base * multiplier^attempt)` before jitter.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let base = self.cfg.base_delay.as_secs_f64();
        let exp = self.cfg.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let raw = base * exp;
        let cap = self.cfg.max_delay.as_secs_f64();
        if !raw.is_finite() || raw > cap {
            self.cfg.max_delay
        } else {
            Duration::from_secs_f64(raw.max(0.0))
        }
    }

    /// Delay before retrying after the failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let capped = self.base_delay_for(attempt);
        if !self.cfg.jitter {
            return capped;
        }
        let factor = JITTER_MIN + fastrand::f64() * (JITTER_MAX - JITTER_MIN);
        capped.mul_f64(factor)
    }

    /// Like [`delay_for`](Self::delay_for), but a server-suggested wait wins
    /// (bounded by `max_delay`, no jitter).
    pub fn delay_for_failure(&self, attempt: u32, err: &Error) -> Duration {
        match err.retry_after() {
            Some(hint) if err.kind() == FailureKind::RateLimited => hint.min(self.cfg.max_delay),
            _ => self.delay_for(attempt),
        }
    }

    /// Decide what to do after attempt `attempt` (0-based) failed with `err`.
    pub fn decide(&self, err: &Error, attempt: u32) -> Decision {
        if !self.classify(err) || attempt.saturating_add(1) >= self.cfg.max_attempts {
            return Decision::Fail;
        }
        Decision::Retry {
            delay: self.delay_for_failure(attempt, err),
        }
    }
}
