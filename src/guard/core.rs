//! Executor state and introspection.

use crate::cache::{Fingerprint, Fingerprinter, RequestDescriptor, ResponseCache};
use crate::config::GuardConfig;
use crate::inflight::InFlightRegistry;
use crate::resilience::backoff::BackoffScheduler;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitSnapshot, CircuitTransition};
use crate::telemetry::{
    GuardEvent, GuardObserver, MetricsRecorder, MetricsSnapshot, TracingObserver,
};
use crate::Result;
use std::sync::{Arc, PoisonError, RwLock};

use super::signals::GuardSignals;

pub(crate) struct GuardState<T> {
    pub(crate) category: String,
    pub(crate) config: GuardConfig,
    pub(crate) fingerprinter: Fingerprinter,
    pub(crate) cache: ResponseCache<T>,
    pub(crate) inflight: InFlightRegistry<T>,
    pub(crate) breaker: CircuitBreaker,
    pub(crate) backoff: BackoffScheduler,
    pub(crate) metrics: MetricsRecorder,
    observers: RwLock<Vec<Arc<dyn GuardObserver>>>,
}

impl<T> GuardState<T> {
    pub(crate) fn emit(&self, event: GuardEvent) {
        self.metrics.record(&event);
        let observers = self.observers.read().unwrap_or_else(PoisonError::into_inner);
        for o in observers.iter() {
            o.on_event(&self.category, &event);
        }
    }

    pub(crate) fn emit_transition(&self, transition: Option<CircuitTransition>) {
        if let Some(t) = transition {
            self.emit(GuardEvent::Transition(t));
        }
    }
}

/// Resilient execution guard for one protected operation category.
///
/// Wraps caller-supplied async operations with response caching, single-flight
/// deduplication, a circuit breaker, per-attempt timeouts and retry with
/// backoff. Cloning is cheap and every clone shares the same state.
///
/// Events go to `tracing` through a built-in [`TracingObserver`]; more
/// observers can be attached with [`with_observer`](Self::with_observer).
///
/// ```rust,no_run
/// use ai_guard_rust::{Error, GuardConfig, RequestDescriptor, ResilientExecutor};
///
/// # async fn demo() -> ai_guard_rust::Result<()> {
/// let guard: ResilientExecutor<String> =
///     ResilientExecutor::new("analyze_food", GuardConfig::default())?;
/// let request = RequestDescriptor::new("two boiled eggs").with_model("m1");
/// let answer = guard
///     .execute(&request, || async { Ok::<_, Error>("150 kcal".to_string()) })
///     .await?;
/// assert_eq!(answer, "150 kcal");
/// # Ok(())
/// # }
/// ```
pub struct ResilientExecutor<T> {
    pub(crate) state: Arc<GuardState<T>>,
}

impl<T> Clone for ResilientExecutor<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ResilientExecutor<T> {
    pub fn new(category: impl Into<String>, config: GuardConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_validated(category.into(), config))
    }

    pub(crate) fn from_validated(category: String, config: GuardConfig) -> Self {
        let state = GuardState {
            fingerprinter: Fingerprinter::new(),
            cache: ResponseCache::new(&config.cache),
            inflight: InFlightRegistry::new(),
            breaker: CircuitBreaker::new(config.circuit.clone()),
            backoff: BackoffScheduler::new(config.retry.clone()),
            metrics: MetricsRecorder::new(config.metrics_enabled),
            observers: RwLock::new(vec![Arc::new(TracingObserver) as Arc<dyn GuardObserver>]),
            category,
            config,
        };
        Self {
            state: Arc::new(state),
        }
    }

    /// Attach a passive observer (builder form).
    pub fn with_observer(self, observer: Arc<dyn GuardObserver>) -> Self {
        self.add_observer(observer);
        self
    }

    pub fn add_observer(&self, observer: Arc<dyn GuardObserver>) {
        self.state
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub fn category(&self) -> &str {
        &self.state.category
    }

    pub fn config(&self) -> &GuardConfig {
        &self.state.config
    }

    pub fn fingerprint(&self, request: &RequestDescriptor) -> Fingerprint {
        self.state.fingerprinter.fingerprint(request)
    }

    /// Current circuit state, for health checks.
    pub fn state(&self) -> CircuitSnapshot {
        self.state.breaker.snapshot()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.state.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.state.metrics.reset();
    }

    pub fn signals(&self) -> GuardSignals {
        GuardSignals {
            category: self.state.category.clone(),
            circuit: self.state.breaker.snapshot(),
            cache_entries: self.state.cache.len(),
            inflight: self.state.inflight.len(),
        }
    }

    pub fn clear_cache(&self) {
        self.state.cache.clear();
    }

    pub fn force_open(&self) {
        let t = self.state.breaker.force_open();
        self.state.emit_transition(t);
    }

    pub fn force_close(&self) {
        let t = self.state.breaker.force_close();
        self.state.emit_transition(t);
    }

    pub fn force_half_open(&self) {
        let t = self.state.breaker.force_half_open();
        self.state.emit_transition(t);
    }

    /// Reset the circuit to a fresh closed state. Cache and metrics are kept.
    pub fn reset(&self) {
        let t = self.state.breaker.reset();
        self.state.emit_transition(t);
    }
}
