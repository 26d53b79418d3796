//! Executor configuration.
//!
//! All fields are optional when loaded from YAML or JSON; missing keys take the
//! documented defaults. Durations are written as integer milliseconds.
//!
//! ```yaml
//! request_timeout_ms: 30000
//! dedup_enabled: true
//! circuit:
//!   failure_threshold: 5
//!   success_threshold: 3
//!   cooldown_ms: 60000
//! cache:
//!   ttl_ms: 30000
//!   capacity: 100
//! retry:
//!   max_attempts: 3
//!   base_delay_ms: 1000
//! ```

use crate::cache::CacheConfig;
use crate::resilience::backoff::BackoffConfig;
use crate::resilience::circuit_breaker::CircuitBreakerConfig;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Full configuration for one [`ResilientExecutor`](crate::guard::ResilientExecutor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub circuit: CircuitBreakerConfig,
    pub cache: CacheConfig,
    pub retry: BackoffConfig,
    #[serde(rename = "request_timeout_ms", with = "duration_ms")]
    pub request_timeout: Duration,
    pub dedup_enabled: bool,
    pub metrics_enabled: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            circuit: CircuitBreakerConfig::default(),
            cache: CacheConfig::default(),
            retry: BackoffConfig::default(),
            request_timeout: Duration::from_secs(30),
            dedup_enabled: true,
            metrics_enabled: true,
        }
    }
}

impl GuardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_circuit(mut self, circuit: CircuitBreakerConfig) -> Self {
        self.circuit = circuit;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_retry(mut self, retry: BackoffConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_dedup(mut self, enabled: bool) -> Self {
        self.dedup_enabled = enabled;
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(raw).map_err(|e| {
            Error::configuration_with_context(
                "failed to parse YAML configuration",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("config_loader"),
            )
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(raw).map_err(|e| {
            Error::configuration_with_context(
                "failed to parse JSON configuration",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("config_loader"),
            )
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a `.yaml`/`.yml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                "failed to read configuration file",
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_details(e.to_string())
                    .with_source("config_loader"),
            )
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&raw),
            other => Err(Error::configuration_with_context(
                "unsupported configuration format",
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_details(format!("extension: {:?}", other))
                    .with_source("config_loader"),
            )),
        }
    }

    /// Reject settings that would make the executor misbehave.
    pub fn validate(&self) -> Result<()> {
        fn invalid(field: &str, msg: &str) -> Error {
            Error::configuration_with_context(
                msg,
                ErrorContext::new()
                    .with_field_path(field)
                    .with_source("config_validator"),
            )
        }

        if self.circuit.failure_threshold == 0 {
            return Err(invalid("circuit.failure_threshold", "must be at least 1"));
        }
        if self.circuit.success_threshold == 0 {
            return Err(invalid("circuit.success_threshold", "must be at least 1"));
        }
        if self.cache.capacity == 0 {
            return Err(invalid("cache.capacity", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(invalid("retry.multiplier", "must be a finite value >= 1"));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(invalid("retry.base_delay_ms", "must not exceed retry.max_delay_ms"));
        }
        if self.request_timeout.is_zero() {
            return Err(invalid("request_timeout_ms", "must be greater than zero"));
        }
        Ok(())
    }
}

/// Serde adapter: `Duration` as integer milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
