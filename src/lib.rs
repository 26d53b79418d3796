//! # ai-guard-rust
//!
//! 面向外部 AI 服务调用的弹性执行层：缓存、去重、熔断、超时与退避重试。
//!
//! Resilient execution layer for calls to external AI and model-serving APIs.
//!
//! ## Overview
//!
//! Every outbound call goes through a [`ResilientExecutor`] owned by its
//! protected operation category (for example `analyze_food` or
//! `transcribe_audio`). The executor serves repeated requests from a bounded
//! TTL cache, collapses concurrent identical requests into one execution,
//! fails fast while the downstream service is unhealthy, bounds every
//! attempt with a timeout and retries transient failures with exponential
//! backoff.
//!
//! The layer never constructs requests itself. Callers pass a
//! [`RequestDescriptor`] that identifies the request and an async closure
//! that performs it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_guard_rust::{Error, GuardConfig, GuardRegistry, RequestDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> ai_guard_rust::Result<()> {
//!     let registry: GuardRegistry<String> = GuardRegistry::new(GuardConfig::default())?;
//!     let guard = registry.get_or_create("analyze_food");
//!
//!     let request = RequestDescriptor::new("two boiled eggs")
//!         .with_model("m1")
//!         .with_temperature(0.0);
//!     let answer = guard
//!         .execute(&request, || async {
//!             // call the provider here
//!             Ok::<_, Error>("150 kcal".to_string())
//!         })
//!         .await?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Request fingerprinting and the bounded TTL response cache |
//! | [`inflight`] | Single-flight registry for concurrent identical requests |
//! | [`resilience`] | Backoff scheduler and circuit breaker |
//! | [`guard`] | Execution orchestrator and per-category registry |
//! | [`telemetry`] | Decision events, observers and metrics |
//! | [`config`] | Per-category configuration loading and validation |
//! | [`error`] | Error type and failure classification |

pub mod cache;
pub mod config;
pub mod error_code;
pub mod guard;
pub mod inflight;
pub mod resilience;
pub mod telemetry;
pub(crate) mod utils;

// Re-export main types for convenience
pub use cache::{Fingerprint, RequestDescriptor};
pub use config::GuardConfig;
pub use error_code::FailureKind;
pub use guard::{GuardRegistry, GuardSignals, ResilientExecutor};
pub use resilience::circuit_breaker::{CircuitPhase, CircuitSnapshot};
pub use telemetry::{GuardEvent, GuardObserver, MetricsSnapshot};
pub use tokio_util::sync::CancellationToken;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
