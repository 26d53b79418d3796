use crate::error_code::FailureKind;
use std::time::Duration;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "cache.capacity")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "analyze_food")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Unified error type for guarded execution.
///
/// Every variant maps to one [`FailureKind`] via [`Error::kind`]. The type is
/// `Clone` so that one settled outcome can be handed to every deduplicated
/// waiter.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Authorization error: {message}{}", format_context(.context))]
    Authorization {
        message: String,
        context: ErrorContext,
    },

    #[error("Invalid remote response: {message}{}", format_context(.context))]
    InvalidResponse {
        message: String,
        context: ErrorContext,
    },

    #[error("Network error: {message}{}", format_context(.context))]
    Network {
        message: String,
        context: ErrorContext,
    },

    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_ms: Option<u64>,
    },

    #[error("Remote error: HTTP {status} ({kind}): {message}")]
    Remote {
        status: u16,
        kind: FailureKind,
        message: String,
        retry_after_ms: Option<u64>,
    },

    #[error("Circuit '{category}' is open; retry in {retry_after_ms}ms")]
    CircuitOpen {
        category: String,
        retry_after_ms: u64,
    },

    #[error("Circuit '{category}' is testing recovery; retry in {retry_after_ms}ms")]
    CircuitTesting {
        category: String,
        retry_after_ms: u64,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unknown error: {message}{}", format_context(.context))]
    Unknown {
        message: String,
        context: ErrorContext,
    },
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Error::Authorization {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Error::InvalidResponse {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Error::Timeout {
            timeout_ms: after.as_millis() as u64,
        }
    }

    /// A rate-limit failure, optionally carrying the server-suggested wait.
    pub fn rate_limited(msg: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Error::RateLimited {
            message: msg.into(),
            retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
        }
    }

    /// A non-success HTTP answer, classified by status code.
    pub fn remote(status: u16, msg: impl Into<String>) -> Self {
        Error::Remote {
            status,
            kind: FailureKind::from_http_status(status),
            message: msg.into(),
            retry_after_ms: None,
        }
    }

    /// A failure known only by its message; classified with ordered heuristics.
    pub fn from_message(msg: impl Into<String>) -> Self {
        let message = msg.into();
        let context = ErrorContext::new();
        match FailureKind::from_message(&message) {
            FailureKind::Authorization => Error::Authorization { message, context },
            FailureKind::InvalidResponse => Error::InvalidResponse { message, context },
            FailureKind::Validation => Error::Validation { message, context },
            FailureKind::Network => Error::Network { message, context },
            FailureKind::RateLimited => Error::RateLimited {
                message,
                retry_after_ms: None,
            },
            FailureKind::Timeout => Error::Timeout { timeout_ms: 0 },
            FailureKind::ServerError => Error::Remote {
                status: 500,
                kind: FailureKind::ServerError,
                message,
                retry_after_ms: None,
            },
            FailureKind::Cancelled => Error::Cancelled,
            FailureKind::CircuitOpen | FailureKind::Unclassified => {
                Error::Unknown { message, context }
            }
        }
    }

    /// Attach a server-suggested wait to a remote failure.
    pub fn with_retry_after(self, after: Duration) -> Self {
        let ms = after.as_millis() as u64;
        match self {
            Error::Remote {
                status,
                kind,
                message,
                ..
            } => Error::Remote {
                status,
                kind,
                message,
                retry_after_ms: Some(ms),
            },
            Error::RateLimited { message, .. } => Error::RateLimited {
                message,
                retry_after_ms: Some(ms),
            },
            other => other,
        }
    }

    /// Classified category of this failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Configuration { .. } | Error::Validation { .. } => FailureKind::Validation,
            Error::Authorization { .. } => FailureKind::Authorization,
            Error::InvalidResponse { .. } => FailureKind::InvalidResponse,
            Error::Network { .. } => FailureKind::Network,
            Error::Timeout { .. } => FailureKind::Timeout,
            Error::RateLimited { .. } => FailureKind::RateLimited,
            Error::Remote { kind, .. } => *kind,
            Error::CircuitOpen { .. } | Error::CircuitTesting { .. } => FailureKind::CircuitOpen,
            Error::Cancelled => FailureKind::Cancelled,
            Error::Unknown { .. } => FailureKind::Unclassified,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().retryable()
    }

    /// Wait hint for the caller: circuit cooldown remaining, or the
    /// server-suggested delay of a rate-limit answer.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::CircuitOpen { retry_after_ms, .. }
            | Error::CircuitTesting { retry_after_ms, .. } => {
                Some(Duration::from_millis(*retry_after_ms))
            }
            Error::RateLimited { retry_after_ms, .. } | Error::Remote { retry_after_ms, .. } => {
                retry_after_ms.map(Duration::from_millis)
            }
            _ => None,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Authorization { context, .. }
            | Error::InvalidResponse { context, .. }
            | Error::Network { context, .. }
            | Error::Unknown { context, .. } => Some(context),
            _ => None,
        }
    }
}
