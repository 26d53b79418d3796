//! 弹性模式模块：熔断器与退避重试调度。
//!
//! # Resilience Primitives Module
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`circuit_breaker`] | Closed / open / half-open state machine for failure isolation |
//! | [`backoff`] | Failure classification and exponential backoff with jitter |
//!
//! ## Circuit Breaker
//!
//! - **Closed**: Normal operation, circuit-tripping failures are counted
//! - **Open**: Threshold reached, requests fail fast until the cooldown ends
//! - **Half-Open**: One probe at a time tests whether the remote recovered
//!
//! ```rust
//! use ai_guard_rust::error_code::FailureKind;
//! use ai_guard_rust::resilience::circuit_breaker::{
//!     Admission, CircuitBreaker, CircuitBreakerConfig, CircuitPhase,
//! };
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig::new()
//!         .with_failure_threshold(2)
//!         .with_cooldown(Duration::from_secs(60)),
//! );
//! assert_eq!(breaker.admit().0, Admission::Allowed);
//! breaker.on_failure(FailureKind::Network, false);
//! breaker.on_failure(FailureKind::Network, false);
//! assert_eq!(breaker.phase(), CircuitPhase::Open);
//! ```
//!
//! ## Backoff
//!
//! ```rust
//! use ai_guard_rust::resilience::backoff::{BackoffConfig, BackoffScheduler};
//! use std::time::Duration;
//!
//! let scheduler = BackoffScheduler::new(BackoffConfig::new().with_jitter(false));
//! assert_eq!(scheduler.delay_for(2), Duration::from_secs(4));
//! ```

pub mod backoff;
pub mod circuit_breaker;
