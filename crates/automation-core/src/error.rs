//! Top-level error types for the automation runtime.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable category used by callers (the HTTP surface, the CLI) to
/// decide status codes / exit codes, and by the audit sink to derive
/// severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Auth,
    Connection,
    Validation,
    NotFound,
    Permission,
    RateLimit,
    Execution,
    Configuration,
    Internal,
}

/// Validation error with a machine-readable field path, matching the
/// `{category, code, message, details}` shape the engine's CRUD operations
/// surface to callers.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Top-level error type for every public engine operation.
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("validation failed")]
    Validation { details: Vec<FieldError> },

    #[error("not found: {resource} {id}")]
    NotFound { resource: String, id: String },

    #[error("permission denied: {reason}")]
    Permission { reason: String },

    #[error("rate limit exceeded, retry after {retry_after_ms}ms")]
    RateLimit { retry_after_ms: u64 },

    #[error("execution error: {message}")]
    Execution { message: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("tracker API error: {0}")]
    Tracker(#[from] tracker_client::ApiError),

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl AutomationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Permission { .. } => ErrorCategory::Permission,
            Self::RateLimit { .. } => ErrorCategory::RateLimit,
            Self::Execution { .. } => ErrorCategory::Execution,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Tracker(e) => match e.category() {
                tracker_client::ErrorCategory::Auth => ErrorCategory::Auth,
                tracker_client::ErrorCategory::Permission => ErrorCategory::Permission,
                tracker_client::ErrorCategory::NotFound => ErrorCategory::NotFound,
                tracker_client::ErrorCategory::RateLimit => ErrorCategory::RateLimit,
                tracker_client::ErrorCategory::Validation => ErrorCategory::Validation,
                tracker_client::ErrorCategory::Connection => ErrorCategory::Connection,
            },
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self::Validation { details: errors }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
