//! 失败分类：定义受保护调用的失败类别及其重试/熔断语义。
//!
//! Failure taxonomy for guarded operations.
//!
//! Every failure that leaves a guarded call is mapped to exactly one
//! [`FailureKind`]. The kind decides whether the backoff loop may retry the
//! call and whether the terminal outcome counts against the circuit breaker.
//!
//! | Code  | Kind              | Retryable | Trips circuit |
//! |-------|-------------------|-----------|---------------|
//! | E1001 | `Validation`      | no        | no            |
//! | E1002 | `Authorization`   | no        | no            |
//! | E1003 | `InvalidResponse` | no        | no            |
//! | E2001 | `RateLimited`     | yes       | yes           |
//! | E3001 | `ServerError`     | yes       | yes           |
//! | E3002 | `Network`         | yes       | yes           |
//! | E3003 | `Timeout`         | yes       | yes           |
//! | E4001 | `CircuitOpen`     | no        | no            |
//! | E4002 | `Cancelled`       | no        | no            |
//! | E9999 | `Unclassified`    | no        | no            |
//!
//! ## Example
//!
//! ```rust
//! use ai_guard_rust::error_code::FailureKind;
//!
//! let kind = FailureKind::from_http_status(429);
//! assert_eq!(kind.code(), "E2001");
//! assert!(kind.retryable());
//! assert!(kind.trips_circuit());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// E1001: Client-side input validation failed before or at the remote
    Validation,
    /// E1002: Credentials missing, expired, or lacking permission
    Authorization,
    /// E1003: Remote answered with a malformed or schema-invalid payload
    InvalidResponse,
    /// E2001: Remote asked us to slow down
    RateLimited,
    /// E3001: 5xx-class failure on the remote side
    ServerError,
    /// E3002: Connectivity failure or offline
    Network,
    /// E3003: Attempt exceeded the configured request timeout
    Timeout,
    /// E4001: Rejected locally by the circuit breaker
    CircuitOpen,
    /// E4002: Caller cancelled the call
    Cancelled,
    /// E9999: Could not be classified
    Unclassified,
}

impl FailureKind {
    pub const ALL: [FailureKind; 10] = [
        Self::Validation,
        Self::Authorization,
        Self::InvalidResponse,
        Self::RateLimited,
        Self::ServerError,
        Self::Network,
        Self::Timeout,
        Self::CircuitOpen,
        Self::Cancelled,
        Self::Unclassified,
    ];

    /// Returns the stable code string (e.g. `"E3002"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation => "E1001",
            Self::Authorization => "E1002",
            Self::InvalidResponse => "E1003",
            Self::RateLimited => "E2001",
            Self::ServerError => "E3001",
            Self::Network => "E3002",
            Self::Timeout => "E3003",
            Self::CircuitOpen => "E4001",
            Self::Cancelled => "E4002",
            Self::Unclassified => "E9999",
        }
    }

    /// Returns the snake_case name (e.g. `"rate_limited"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Authorization => "authorization",
            Self::InvalidResponse => "invalid_response",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::CircuitOpen => "circuit_open",
            Self::Cancelled => "cancelled",
            Self::Unclassified => "unclassified",
        }
    }

    /// Whether a local retry may be attempted for this kind.
    ///
    /// Unclassified failures fail closed here; the backoff scheduler can be
    /// configured to relax that separately.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::Network | Self::Timeout
        )
    }

    /// Whether a terminal failure of this kind counts against the circuit.
    #[inline]
    pub fn trips_circuit(&self) -> bool {
        self.retryable()
    }

    /// Maps an HTTP status code to the most likely kind.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authorization,
            400 | 404 | 413 | 422 => Self::Validation,
            408 | 504 => Self::Timeout,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::Unclassified,
        }
    }

    /// Maps a provider error code/type string (e.g. `"rate_limit_exceeded"`).
    pub fn from_provider_code(provider_code: &str) -> Option<Self> {
        let kind = match provider_code {
            "invalid_request" | "invalid_request_error" | "validation" | "request_too_large"
            | "context_length_exceeded" => Self::Validation,
            "authentication" | "authentication_error" | "invalid_api_key" | "permission_denied"
            | "permission_error" | "unauthorized" => Self::Authorization,
            "invalid_response" | "malformed_response" | "schema_error" => Self::InvalidResponse,
            "rate_limited" | "rate_limit_exceeded" | "resource_exhausted" => Self::RateLimited,
            "server_error" | "internal_error" | "overloaded" | "overloaded_error"
            | "unavailable" => Self::ServerError,
            "network" | "network_error" | "offline" => Self::Network,
            "timeout" | "deadline_exceeded" => Self::Timeout,
            "cancelled" | "aborted" => Self::Cancelled,
            _ => return None,
        };
        Some(kind)
    }

    /// Classifies a free-form failure message.
    ///
    /// Rules are ordered and the first match wins: authorization, malformed
    /// response, input validation, then the transient kinds. Anything else is
    /// `Unclassified`.
    pub fn from_message(message: &str) -> Self {
        let m = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| m.contains(n));

        if has(&["unauthorized", "forbidden", "permission", "api key", "401", "403"]) {
            Self::Authorization
        } else if has(&["invalid json", "malformed", "unexpected token", "schema", "parse"]) {
            Self::InvalidResponse
        } else if has(&["validation", "invalid input", "invalid argument", "400"]) {
            Self::Validation
        } else if has(&["timeout", "timed out", "deadline"]) {
            Self::Timeout
        } else if has(&["rate limit", "too many requests", "429", "quota"]) {
            Self::RateLimited
        } else if has(&["network", "offline", "connection", "fetch failed", "dns", "econn"]) {
            Self::Network
        } else if has(&["internal server", "bad gateway", "unavailable", "500", "502", "503"]) {
            Self::ServerError
        } else {
            Self::Unclassified
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
