use crate::error_code::FailureKind;
use crate::utils::epoch_ms;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitPhase {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitPhase::Closed => "closed",
            CircuitPhase::Open => "open",
            CircuitPhase::HalfOpen => "half_open",
        })
    }
}

/// A phase change, stamped with wall-clock milliseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitTransition {
    pub from: CircuitPhase,
    pub to: CircuitPhase,
    pub at_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub phase: CircuitPhase,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub cooldown_ms: u64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    /// Remaining open time in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
    pub probe_in_flight: bool,
    pub last_failure_at_ms: Option<u64>,
    pub last_success_at_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    #[serde(rename = "cooldown_ms", with = "crate::config::duration_ms")]
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

/// Outcome of asking the breaker for permission to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Closed: run normally.
    Allowed,
    /// Half-open: run as the single recovery probe.
    Probe,
    /// Open and cooling down.
    Open { retry_after: Duration },
    /// Half-open with a probe already in flight.
    Testing,
}

#[derive(Debug)]
struct State {
    phase: CircuitPhase,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_at_ms: Option<u64>,
    last_success_at_ms: Option<u64>,
    open_until: Option<Instant>,
    probe_in_flight: bool,
}

impl State {
    fn closed() -> Self {
        Self {
            phase: CircuitPhase::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_failure_at_ms: None,
            last_success_at_ms: None,
            open_until: None,
            probe_in_flight: false,
        }
    }

    fn enter(&mut self, to: CircuitPhase) -> Option<CircuitTransition> {
        let from = self.phase;
        self.phase = to;
        (from != to).then(|| CircuitTransition {
            from,
            to,
            at_ms: epoch_ms(),
        })
    }
}

/// Consecutive-failure circuit breaker with a single-probe half-open phase.
///
/// - `closed -> open` once `failure_threshold` circuit-tripping failures happen in a row
/// - `open -> half_open` on the first admission request at or after the cooldown
/// - `half_open -> closed` after `success_threshold` successful probes in a row
/// - `half_open -> open` on any circuit-tripping probe failure
///
/// Failures whose [`FailureKind`] does not trip the circuit never move the counters.
pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        Self {
            cfg,
            state: Mutex::new(State::closed()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Plain counters; a panic elsewhere cannot leave them half-written.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.cfg
    }

    pub fn phase(&self) -> CircuitPhase {
        self.lock().phase
    }

    /// Ask to run one attempt. A returned `Probe` must be settled with
    /// `on_success`/`on_failure` (with `probe = true`) or `release_probe`.
    pub fn admit(&self) -> (Admission, Option<CircuitTransition>) {
        let mut st = self.lock();
        match st.phase {
            CircuitPhase::Closed => (Admission::Allowed, None),
            CircuitPhase::Open => {
                let now = Instant::now();
                match st.open_until {
                    Some(until) if now < until => (
                        Admission::Open {
                            retry_after: until - now,
                        },
                        None,
                    ),
                    _ => {
                        st.open_until = None;
                        st.consecutive_successes = 0;
                        st.probe_in_flight = true;
                        let t = st.enter(CircuitPhase::HalfOpen);
                        (Admission::Probe, t)
                    }
                }
            }
            CircuitPhase::HalfOpen => {
                if st.probe_in_flight {
                    (Admission::Testing, None)
                } else {
                    st.probe_in_flight = true;
                    (Admission::Probe, None)
                }
            }
        }
    }

    pub fn on_success(&self, probe: bool) -> Option<CircuitTransition> {
        let mut st = self.lock();
        if probe {
            st.probe_in_flight = false;
        }
        st.last_success_at_ms = Some(epoch_ms());
        match st.phase {
            CircuitPhase::Closed => {
                st.consecutive_failures = 0;
                None
            }
            CircuitPhase::HalfOpen => {
                st.consecutive_successes = st.consecutive_successes.saturating_add(1);
                if st.consecutive_successes >= self.cfg.success_threshold {
                    st.consecutive_failures = 0;
                    st.consecutive_successes = 0;
                    st.enter(CircuitPhase::Closed)
                } else {
                    None
                }
            }
            // A straggler that started before the circuit opened.
            CircuitPhase::Open => None,
        }
    }

    pub fn on_failure(&self, kind: FailureKind, probe: bool) -> Option<CircuitTransition> {
        let mut st = self.lock();
        if probe {
            st.probe_in_flight = false;
        }
        if !kind.trips_circuit() {
            return None;
        }
        st.last_failure_at_ms = Some(epoch_ms());
        st.consecutive_failures = st.consecutive_failures.saturating_add(1);
        match st.phase {
            CircuitPhase::Closed if st.consecutive_failures >= self.cfg.failure_threshold => {
                st.open_until = Some(Instant::now() + self.cfg.cooldown);
                st.enter(CircuitPhase::Open)
            }
            CircuitPhase::HalfOpen => {
                st.consecutive_successes = 0;
                st.open_until = Some(Instant::now() + self.cfg.cooldown);
                st.enter(CircuitPhase::Open)
            }
            _ => None,
        }
    }

    /// Give back a probe slot without recording an outcome (e.g. cancellation).
    pub fn release_probe(&self) {
        self.lock().probe_in_flight = false;
    }

    pub fn force_open(&self) -> Option<CircuitTransition> {
        let mut st = self.lock();
        st.open_until = Some(Instant::now() + self.cfg.cooldown);
        st.probe_in_flight = false;
        st.consecutive_successes = 0;
        st.enter(CircuitPhase::Open)
    }

    pub fn force_half_open(&self) -> Option<CircuitTransition> {
        let mut st = self.lock();
        st.open_until = None;
        st.probe_in_flight = false;
        st.consecutive_successes = 0;
        st.enter(CircuitPhase::HalfOpen)
    }

    pub fn force_close(&self) -> Option<CircuitTransition> {
        let mut st = self.lock();
        st.open_until = None;
        st.probe_in_flight = false;
        st.consecutive_failures = 0;
        st.consecutive_successes = 0;
        st.enter(CircuitPhase::Closed)
    }

    /// Back to a fresh closed breaker, timestamps included.
    pub fn reset(&self) -> Option<CircuitTransition> {
        let mut st = self.lock();
        let from = st.phase;
        *st = State::closed();
        (from != CircuitPhase::Closed).then(|| CircuitTransition {
            from,
            to: CircuitPhase::Closed,
            at_ms: epoch_ms(),
        })
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let now = Instant::now();
        let st = self.lock();
        let open_remaining_ms = st.open_until.and_then(|until| {
            if until > now {
                Some((until - now).as_millis() as u64)
            } else {
                None
            }
        });
        CircuitSnapshot {
            phase: st.phase,
            failure_threshold: self.cfg.failure_threshold,
            success_threshold: self.cfg.success_threshold,
            cooldown_ms: self.cfg.cooldown.as_millis() as u64,
            consecutive_failures: st.consecutive_failures,
            consecutive_successes: st.consecutive_successes,
            open_remaining_ms,
            probe_in_flight: st.probe_in_flight,
            last_failure_at_ms: st.last_failure_at_ms,
            last_success_at_ms: st.last_success_at_ms,
        }
    }
}
