use super::{GuardEvent, GuardObserver};
use crate::error_code::FailureKind;
use crate::resilience::circuit_breaker::CircuitTransition;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Cumulative counters; only [`MetricsRecorder::reset`] ever lowers them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub cache_hits: u64,
    /// Calls that were neither cache hits nor dedup hits.
    pub cache_misses: u64,
    pub cache_evictions: u64,
    pub dedup_hits: u64,
    /// Invocations of the underlying operation, retries included.
    pub executions: u64,
    pub retries: u64,
    pub successes: u64,
    pub rejections: u64,
    pub cancellations: u64,
    /// Failures returned to callers, by kind.
    pub failures: BTreeMap<FailureKind, u64>,
    pub transitions: Vec<CircuitTransition>,
}

impl MetricsSnapshot {
    pub fn failures_of(&self, kind: FailureKind) -> u64 {
        self.failures.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_failures(&self) -> u64 {
        self.failures.values().sum()
    }

    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Passive observer accumulating a [`MetricsSnapshot`].
pub struct MetricsRecorder {
    enabled: AtomicBool,
    snapshot: Mutex<MetricsSnapshot>,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MetricsRecorder {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            snapshot: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsSnapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.lock().clone()
    }

    /// Zero all counters and clear the transition log.
    pub fn reset(&self) {
        *self.lock() = MetricsSnapshot::default();
    }

    pub fn record(&self, event: &GuardEvent) {
        if !self.is_enabled() {
            return;
        }
        let mut m = self.lock();
        match event {
            GuardEvent::Request { .. } => m.total_requests += 1,
            GuardEvent::CacheHit { .. } => m.cache_hits += 1,
            GuardEvent::CacheMiss { .. } => m.cache_misses += 1,
            GuardEvent::CacheEvicted { .. } => m.cache_evictions += 1,
            GuardEvent::DedupHit { .. } => m.dedup_hits += 1,
            GuardEvent::Attempt { .. } => m.executions += 1,
            GuardEvent::Retry { .. } => m.retries += 1,
            GuardEvent::Success { .. } => m.successes += 1,
            GuardEvent::Failure { kind, .. } => *m.failures.entry(*kind).or_insert(0) += 1,
            GuardEvent::Rejected { .. } => {
                m.rejections += 1;
                *m.failures.entry(FailureKind::CircuitOpen).or_insert(0) += 1;
            }
            GuardEvent::Cancelled { .. } => {
                m.cancellations += 1;
                *m.failures.entry(FailureKind::Cancelled).or_insert(0) += 1;
            }
            GuardEvent::Transition(t) => m.transitions.push(*t),
        }
    }
}

impl GuardObserver for MetricsRecorder {
    fn on_event(&self, _category: &str, event: &GuardEvent) {
        self.record(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::CircuitPhase;

    fn fp() -> String {
        "abc".to_string()
    }

    #[test]
    fn test_counts_and_reset() {
        let rec = MetricsRecorder::default();
        rec.record(&GuardEvent::Request { fingerprint: fp() });
        rec.record(&GuardEvent::CacheHit { fingerprint: fp() });
        rec.record(&GuardEvent::Request { fingerprint: fp() });
        rec.record(&GuardEvent::CacheMiss { fingerprint: fp() });
        rec.record(&GuardEvent::Failure {
            kind: FailureKind::Network,
            attempts: 3,
        });
        rec.record(&GuardEvent::Rejected {
            testing: false,
            retry_after_ms: 10,
        });
        rec.record(&GuardEvent::Transition(CircuitTransition {
            from: CircuitPhase::Closed,
            to: CircuitPhase::Open,
            at_ms: 1,
        }));

        let m = rec.snapshot();
        assert_eq!(m.total_requests, 2);
        assert_eq!(m.cache_hits, 1);
        assert_eq!(m.cache_misses, 1);
        assert_eq!(m.failures_of(FailureKind::Network), 1);
        assert_eq!(m.failures_of(FailureKind::CircuitOpen), 1);
        assert_eq!(m.total_failures(), 2);
        assert_eq!(m.transitions.len(), 1);
        assert!((m.cache_hit_ratio() - 0.5).abs() < f64::EPSILON);

        rec.reset();
        assert_eq!(rec.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_disabled_recorder_ignores_events() {
        let rec = MetricsRecorder::new(false);
        rec.record(&GuardEvent::Request { fingerprint: fp() });
        assert_eq!(rec.snapshot().total_requests, 0);
        rec.set_enabled(true);
        rec.record(&GuardEvent::Request { fingerprint: fp() });
        assert_eq!(rec.snapshot().total_requests, 1);
    }

    #[test]
    fn test_snapshot_serializes_failure_names() {
        let rec = MetricsRecorder::default();
        rec.record(&GuardEvent::Failure {
            kind: FailureKind::RateLimited,
            attempts: 1,
        });
        let v = serde_json::to_value(rec.snapshot()).unwrap();
        assert_eq!(v["failures"]["rate_limited"], 1);
    }
}
