//! 遥测模块：执行器决策事件的可插拔观察者与指标记录。
//!
//! Telemetry for guarded execution.
//!
//! The executor reports a [`GuardEvent`] at every decision point. Observers
//! are passive: they cannot fail, cannot block for long and cannot influence
//! control flow, so the executor behaves identically with none attached.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`GuardEvent`] | Typed decision event |
//! | [`GuardObserver`] | Trait for event destinations |
//! | [`MetricsRecorder`] | Cumulative counters and transition log |
//! | [`TracingObserver`] | Routes events to `tracing` |
//! | [`InMemoryObserver`] | Bounded in-memory event log for tests and diagnostics |
//! | [`CompositeObserver`] | Fan-out to several observers |

mod metrics;

pub use metrics::{MetricsRecorder, MetricsSnapshot};

use crate::error_code::FailureKind;
use crate::resilience::circuit_breaker::CircuitTransition;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GuardEvent {
    Request { fingerprint: String },
    CacheHit { fingerprint: String },
    CacheMiss { fingerprint: String },
    CacheEvicted { fingerprint: String },
    DedupHit { fingerprint: String },
    /// One invocation of the underlying operation (0-based).
    Attempt { attempt: u32, probe: bool },
    Retry { attempt: u32, delay_ms: u64, kind: FailureKind },
    Success { attempts: u32, elapsed_ms: u64 },
    Failure { kind: FailureKind, attempts: u32 },
    Rejected { testing: bool, retry_after_ms: u64 },
    Cancelled { fingerprint: String },
    Transition(CircuitTransition),
}

pub trait GuardObserver: Send + Sync {
    fn on_event(&self, category: &str, event: &GuardEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl GuardObserver for TracingObserver {
    fn on_event(&self, category: &str, event: &GuardEvent) {
        match event {
            GuardEvent::Transition(t) => tracing::info!(
                category,
                from = %t.from,
                to = %t.to,
                "circuit transition"
            ),
            GuardEvent::Failure { kind, attempts } => tracing::warn!(
                category,
                kind = kind.name(),
                code = kind.code(),
                attempts,
                "guarded call failed"
            ),
            GuardEvent::Retry {
                attempt,
                delay_ms,
                kind,
            } => tracing::warn!(category, attempt, delay_ms, kind = kind.name(), "retrying"),
            GuardEvent::Rejected {
                testing,
                retry_after_ms,
            } => tracing::info!(category, testing, retry_after_ms, "rejected by circuit"),
            other => tracing::debug!(category, event = ?other, "guard event"),
        }
    }
}

/// Keeps the most recent `max_events` events.
pub struct InMemoryObserver {
    events: Mutex<VecDeque<(String, GuardEvent)>>,
    max_events: usize,
}

impl InMemoryObserver {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            max_events,
        }
    }

    pub fn events(&self) -> Vec<(String, GuardEvent)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Events for one category, in order.
    pub fn events_for(&self, category: &str) -> Vec<GuardEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(c, _)| c == category)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GuardObserver for InMemoryObserver {
    fn on_event(&self, category: &str, event: &GuardEvent) {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.push_back((category.to_string(), event.clone()));
        while events.len() > self.max_events {
            events.pop_front();
        }
    }
}

/// Composite observer for multiple destinations.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn GuardObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(mut self, observer: Arc<dyn GuardObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl GuardObserver for CompositeObserver {
    fn on_event(&self, category: &str, event: &GuardEvent) {
        for o in &self.observers {
            o.on_event(category, event);
        }
    }
}
