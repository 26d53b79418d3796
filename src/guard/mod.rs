//! 执行编排模块：对外唯一的受保护调用入口。
//!
//! # Execution Orchestrator
//!
//! [`ResilientExecutor`] composes the fingerprinter, response cache,
//! in-flight registry, circuit breaker and backoff scheduler around a
//! caller-supplied async operation. [`GuardRegistry`] keeps one executor per
//! protected operation category and is owned by the application's
//! composition root.

mod core;
mod execution;
mod registry;
mod signals;

pub use self::core::ResilientExecutor;
pub use registry::GuardRegistry;
pub use signals::GuardSignals;
