use crate::resilience::circuit_breaker::CircuitSnapshot;
use serde::Serialize;

/// A facts-only snapshot of one category, for health-check surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct GuardSignals {
    pub category: String,
    pub circuit: CircuitSnapshot,
    /// Stored cache entries (expired ones are purged lazily).
    pub cache_entries: usize,
    pub inflight: usize,
}
