use crate::config::GuardConfig;
use crate::telemetry::GuardObserver;
use crate::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::core::ResilientExecutor;
use super::signals::GuardSignals;

/// One [`ResilientExecutor`] per protected operation category.
///
/// Executors are created lazily on first use and live as long as the
/// registry. Configuration is validated up front, so lookups never fail.
///
/// ```rust
/// use ai_guard_rust::{GuardConfig, GuardRegistry};
/// use ai_guard_rust::resilience::circuit_breaker::CircuitBreakerConfig;
///
/// let registry: GuardRegistry = GuardRegistry::new(GuardConfig::default())
///     .unwrap()
///     .with_category_config(
///         "transcribe_audio",
///         GuardConfig::default()
///             .with_circuit(CircuitBreakerConfig::new().with_failure_threshold(2)),
///     )
///     .unwrap();
///
/// let a = registry.get_or_create("analyze_food");
/// let b = registry.get_or_create("analyze_food");
/// assert_eq!(a.state().failure_threshold, 5);
/// assert_eq!(registry.get_or_create("transcribe_audio").state().failure_threshold, 2);
/// assert_eq!(registry.categories(), vec!["analyze_food", "transcribe_audio"]);
/// # drop((a, b));
/// ```
pub struct GuardRegistry<T = serde_json::Value> {
    default_config: GuardConfig,
    overrides: HashMap<String, GuardConfig>,
    observers: Vec<Arc<dyn GuardObserver>>,
    executors: Mutex<HashMap<String, ResilientExecutor<T>>>,
}

impl<T: Clone + Send + Sync + 'static> GuardRegistry<T> {
    pub fn new(default_config: GuardConfig) -> Result<Self> {
        default_config.validate()?;
        Ok(Self {
            default_config,
            overrides: HashMap::new(),
            observers: Vec::new(),
            executors: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_category_config(
        mut self,
        category: impl Into<String>,
        config: GuardConfig,
    ) -> Result<Self> {
        config.validate()?;
        self.overrides.insert(category.into(), config);
        Ok(self)
    }

    /// Observer attached to every executor created from now on.
    pub fn with_observer(mut self, observer: Arc<dyn GuardObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ResilientExecutor<T>>> {
        self.executors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_or_create(&self, category: &str) -> ResilientExecutor<T> {
        let mut executors = self.lock();
        if let Some(existing) = executors.get(category) {
            return existing.clone();
        }
        let config = self
            .overrides
            .get(category)
            .unwrap_or(&self.default_config)
            .clone();
        let executor = ResilientExecutor::from_validated(category.to_string(), config);
        for o in &self.observers {
            executor.add_observer(Arc::clone(o));
        }
        tracing::debug!(category, "created guard");
        executors.insert(category.to_string(), executor.clone());
        executor
    }

    pub fn get(&self, category: &str) -> Option<ResilientExecutor<T>> {
        self.lock().get(category).cloned()
    }

    /// Names of the categories created so far, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn signals(&self) -> Vec<GuardSignals> {
        let mut executors: Vec<ResilientExecutor<T>> = self.lock().values().cloned().collect();
        executors.sort_by(|a, b| a.category().cmp(b.category()));
        executors.iter().map(|e| e.signals()).collect()
    }

    /// Reset every circuit and clear every cache and metrics log.
    pub fn reset_all(&self) {
        let executors: Vec<ResilientExecutor<T>> = self.lock().values().cloned().collect();
        for e in executors {
            e.reset();
            e.clear_cache();
            e.reset_metrics();
        }
    }
}
