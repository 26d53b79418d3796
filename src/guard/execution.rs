//! 受保护调用的执行流程：缓存、去重、熔断、超时与退避重试。
//!
//! Guarded execution.

use crate::cache::{Fingerprint, RequestDescriptor};
use crate::inflight::SharedOutcome;
use crate::resilience::backoff::Decision;
use crate::resilience::circuit_breaker::Admission;
use crate::telemetry::GuardEvent;
use crate::{Error, Result};
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::core::{GuardState, ResilientExecutor};

/// Frees the half-open probe slot if the work is dropped before it settles.
struct ProbeGuard<T> {
    state: Arc<GuardState<T>>,
    probe: bool,
    settled: bool,
}

impl<T> Drop for ProbeGuard<T> {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            debug!(
                category = self.state.category.as_str(),
                "probe abandoned before settling"
            );
            self.state.breaker.release_probe();
        }
    }
}

/// Outcome of the circuit gate for a call that missed the cache.
enum Gate<T> {
    Run { probe: bool },
    Join(SharedOutcome<T>),
    Reject(Error),
}

impl<T: Clone + Send + Sync + 'static> GuardState<T> {
    /// Ask the breaker for admission and record the cache miss.
    ///
    /// While a probe is testing recovery, a caller with the probe's own
    /// fingerprint joins it; the probe may have registered after this
    /// caller's first in-flight lookup.
    fn gate(&self, fp: &Fingerprint) -> Gate<T> {
        let (admission, transition) = self.breaker.admit();
        self.emit_transition(transition);
        let err = match admission {
            Admission::Allowed | Admission::Probe => {
                self.emit_miss(fp);
                return Gate::Run {
                    probe: matches!(admission, Admission::Probe),
                };
            }
            Admission::Open { retry_after } => {
                let retry_after_ms = retry_after.as_millis() as u64;
                self.emit_miss(fp);
                self.emit(GuardEvent::Rejected {
                    testing: false,
                    retry_after_ms,
                });
                Error::CircuitOpen {
                    category: self.category.clone(),
                    retry_after_ms,
                }
            }
            Admission::Testing => {
                if self.config.dedup_enabled {
                    if let Some(handle) = self.inflight.lookup(fp) {
                        self.emit(GuardEvent::DedupHit {
                            fingerprint: fp.to_string(),
                        });
                        return Gate::Join(handle);
                    }
                }
                // The active probe settles within one request timeout.
                let retry_after_ms = self.config.request_timeout.as_millis() as u64;
                self.emit_miss(fp);
                self.emit(GuardEvent::Rejected {
                    testing: true,
                    retry_after_ms,
                });
                Error::CircuitTesting {
                    category: self.category.clone(),
                    retry_after_ms,
                }
            }
        };
        Gate::Reject(err)
    }

    fn emit_miss(&self, fp: &Fingerprint) {
        self.emit(GuardEvent::CacheMiss {
            fingerprint: fp.to_string(),
        });
    }
}

impl<T: Clone + Send + Sync + 'static> ResilientExecutor<T> {
    /// Run `operation` under the guard, without external cancellation.
    pub async fn execute<F, Fut>(&self, request: &RequestDescriptor, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.execute_with_cancel(request, operation, &CancellationToken::new())
            .await
    }

    /// Run `operation` under the guard.
    ///
    /// 1. cache hit: return the stored payload without touching circuit or dedup
    /// 2. identical call in flight: wait for its outcome
    /// 3. circuit gate: fail fast while open, one probe while half-open
    /// 4. execute with per-attempt timeout and backoff retries
    /// 5. record the terminal outcome in cache, circuit and metrics
    ///
    /// Cancelling `cancel` detaches this caller. The underlying work stops
    /// only if no other caller is waiting on it; a cancellation is never
    /// recorded as a circuit failure.
    pub async fn execute_with_cancel<F, Fut>(
        &self,
        request: &RequestDescriptor,
        operation: F,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let st = &self.state;
        let fp = st.fingerprinter.fingerprint(request);
        st.emit(GuardEvent::Request {
            fingerprint: fp.to_string(),
        });

        if st.config.cache.enabled {
            if let Some(payload) = st.cache.get(&fp) {
                st.emit(GuardEvent::CacheHit {
                    fingerprint: fp.to_string(),
                });
                return Ok(payload);
            }
        }

        if st.config.dedup_enabled {
            if let Some(handle) = st.inflight.lookup(&fp) {
                st.emit(GuardEvent::DedupHit {
                    fingerprint: fp.to_string(),
                });
                return self.wait(handle, &fp, cancel).await;
            }
        }

        let probe = match st.gate(&fp) {
            Gate::Run { probe } => probe,
            Gate::Join(handle) => return self.wait(handle, &fp, cancel).await,
            Gate::Reject(err) => return Err(err),
        };

        let guard = ProbeGuard {
            state: Arc::clone(st),
            probe,
            settled: false,
        };
        let work = run(
            Arc::clone(st),
            fp.clone(),
            request.clone(),
            operation,
            guard,
        );

        if !st.config.dedup_enabled {
            return self.wait(work, &fp, cancel).await;
        }

        let registration = st.inflight.register(&fp, move || work);
        if registration.joined {
            // Lost a registration race; the unused work (and its probe slot) was dropped.
            st.emit(GuardEvent::DedupHit {
                fingerprint: fp.to_string(),
            });
        }
        self.wait(registration.handle, &fp, cancel).await
    }

    async fn wait<W>(&self, work: W, fp: &Fingerprint, cancel: &CancellationToken) -> Result<T>
    where
        W: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.state.emit(GuardEvent::Cancelled {
                    fingerprint: fp.to_string(),
                });
                Err(Error::Cancelled)
            }
            outcome = work => outcome,
        }
    }
}

/// The single execution shared by every waiter of one fingerprint.
fn run<T, F, Fut>(
    st: Arc<GuardState<T>>,
    fp: Fingerprint,
    request: RequestDescriptor,
    mut operation: F,
    guard: ProbeGuard<T>,
) -> BoxFuture<'static, Result<T>>
where
    T: Clone + Send + Sync + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    async move {
        // Move the whole guard in; capturing only its fields would drop it here.
        let mut guard = guard;
        let probe = guard.probe;
        // A half-open probe is a single attempt.
        let max_attempts = if probe {
            1
        } else {
            st.backoff.config().max_attempts
        };
        let timeout = st.config.request_timeout;
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            st.emit(GuardEvent::Attempt { attempt, probe });
            let outcome = match tokio::time::timeout(timeout, operation()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::timeout(timeout)),
            };

            let err = match outcome {
                Ok(payload) => {
                    guard.settled = true;
                    if st.config.cache.enabled {
                        if let Some(evicted) = st.cache.put(fp.clone(), payload.clone(), request) {
                            st.emit(GuardEvent::CacheEvicted {
                                fingerprint: evicted.to_string(),
                            });
                        }
                    }
                    st.emit_transition(st.breaker.on_success(probe));
                    st.emit(GuardEvent::Success {
                        attempts: attempt + 1,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });
                    return Ok(payload);
                }
                Err(err) => err,
            };

            let decision = if attempt + 1 >= max_attempts {
                Decision::Fail
            } else {
                st.backoff.decide(&err, attempt)
            };

            match decision {
                Decision::Retry { delay } => {
                    st.emit(GuardEvent::Retry {
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                        kind: err.kind(),
                    });
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Decision::Fail => {
                    guard.settled = true;
                    let kind = err.kind();
                    st.emit_transition(st.breaker.on_failure(kind, probe));
                    st.emit(GuardEvent::Failure {
                        kind,
                        attempts: attempt + 1,
                    });
                    return Err(err);
                }
            }
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GuardConfig;

    #[tokio::test]
    async fn test_testing_circuit_joins_same_fingerprint_work() {
        let guard: ResilientExecutor<String> =
            ResilientExecutor::new("analyze_food", GuardConfig::default()).unwrap();
        guard.force_half_open();
        let st = &guard.state;

        // Another caller won admission and registered its work for "eggs".
        let (admission, _) = st.breaker.admit();
        assert!(matches!(admission, Admission::Probe));
        let eggs = Fingerprint::new("eggs");
        let _owner = st
            .inflight
            .register(&eggs, || futures::future::pending::<Result<String>>().boxed());

        assert!(matches!(st.gate(&eggs), Gate::Join(_)));
        assert!(matches!(
            st.gate(&Fingerprint::new("toast")),
            Gate::Reject(Error::CircuitTesting { .. })
        ));

        let m = guard.metrics();
        assert_eq!(m.dedup_hits, 1);
        assert_eq!(m.cache_misses, 1);
        assert_eq!(m.rejections, 1);
    }
}
