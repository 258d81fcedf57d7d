//! Error types for tracker client operations.
//!
//! Every failure is classified into the category vocabulary the automation
//! engine uses to decide retries, permission surfacing, and audit severity
//! (see the engine's `AutomationError::category`).

use thiserror::Error;

/// High-level categorization of a tracker API failure.
///
/// Maps directly from HTTP status the way the engine's error contract
/// requires: 401→auth, 403→permission, 404→not_found, 429→rate_limit,
/// 400→validation, other 4xx/5xx→connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Auth,
    Permission,
    NotFound,
    RateLimit,
    Validation,
    Connection,
}

impl ErrorCategory {
    /// Classify an HTTP status code the way every tracker call does.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Auth,
            403 => Self::Permission,
            404 => Self::NotFound,
            429 => Self::RateLimit,
            400 => Self::Validation,
            _ => Self::Connection,
        }
    }
}

/// Error returned by any `TrackerClient` operation.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("tracker returned {status}: {message}")]
    Http {
        status: u16,
        message: String,
        category: ErrorCategory,
        retry_after_ms: Option<u64>,
    },

    #[error("request to tracker failed: {0}")]
    Transport(String),

    #[error("failed to decode tracker response: {0}")]
    Decode(String),

    #[error("tracker client misconfigured: {0}")]
    Configuration(String),

    #[error("no matching transition named '{0}'")]
    TransitionNotFound(String),

    #[error("circuit breaker open for tracker API")]
    CircuitOpen,

    #[error("circuit breaker operation timed out after {timeout_ms}ms")]
    CircuitTimeout { timeout_ms: u64 },
}

impl ApiError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Http { category, .. } => *category,
            Self::Transport(_) => ErrorCategory::Connection,
            Self::Decode(_) => ErrorCategory::Connection,
            Self::Configuration(_) => ErrorCategory::Validation,
            Self::TransitionNotFound(_) => ErrorCategory::NotFound,
            Self::CircuitOpen | Self::CircuitTimeout { .. } => ErrorCategory::Connection,
        }
    }

    /// Whether a retry is likely to succeed: network blips, 429s, and 5xx.
    /// A tripped breaker is deliberately not retried here — the caller
    /// already exhausted its retry budget to trip it.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Transport(_) => true,
            Self::Decode(_) => false,
            Self::Configuration(_) => false,
            Self::TransitionNotFound(_) => false,
            Self::CircuitOpen | Self::CircuitTimeout { .. } => false,
        }
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::Http { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
