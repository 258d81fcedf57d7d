//! HTTP error mapping for the automation API.
//!
//! Every handler returns `Result<_, ApiError>`; `ApiError` wraps an
//! [`AutomationError`] and renders it as the `{category, code, message,
//! details}` body shape, with a status code derived from
//! [`AutomationError::category`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use automation_core::{AutomationError, ErrorCategory};
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub AutomationError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let category = err.category();

        let status = match category {
            ErrorCategory::Auth => StatusCode::UNAUTHORIZED,
            ErrorCategory::Permission => StatusCode::FORBIDDEN,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::Connection => StatusCode::BAD_GATEWAY,
            ErrorCategory::Execution => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCategory::Configuration | ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let (code, message, details, retry_after_ms) = match &err {
            AutomationError::Validation { details } => (
                "validation_failed",
                err.to_string(),
                Some(serde_json::to_value(details).unwrap_or_default()),
                None,
            ),
            AutomationError::NotFound { resource, id } => (
                "not_found",
                format!("{resource} {id} not found"),
                None,
                None,
            ),
            AutomationError::Permission { reason } => {
                warn!(reason = %reason, "permission denied");
                ("permission_denied", reason.clone(), None, None)
            }
            AutomationError::RateLimit { retry_after_ms } => {
                warn!(retry_after_ms, "rate limit exceeded");
                ("rate_limited", err.to_string(), None, Some(*retry_after_ms))
            }
            AutomationError::Execution { message } => ("execution_error", message.clone(), None, None),
            AutomationError::Configuration { message } => {
                error!(message = %message, "configuration error");
                (
                    "configuration_error",
                    "internal configuration error".to_string(),
                    None,
                    None,
                )
            }
            AutomationError::Tracker(inner) => {
                warn!(error = %inner, "upstream tracker error");
                ("tracker_error", err.to_string(), None, None)
            }
            AutomationError::Internal { message } => {
                error!(message = %message, "internal error");
                (
                    "internal_error",
                    "an internal error occurred".to_string(),
                    None,
                    None,
                )
            }
        };

        let body = serde_json::json!({
            "category": category,
            "code": code,
            "message": message,
            "details": details,
        });

        let mut response = (status, Json(body)).into_response();
        if let Some(retry_ms) = retry_after_ms {
            let retry_secs = retry_ms.div_ceil(1000).max(1);
            if let Ok(value) = retry_secs.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
