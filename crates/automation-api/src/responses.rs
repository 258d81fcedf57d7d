//! Request/response DTOs and query parameter types for the HTTP surface.
//!
//! Most routes pass the engine's own domain types (`Rule`, `Execution`,
//! `RuleSpec`, ...) straight through as request/response bodies rather than
//! shadowing them with near-identical wire structs — they already derive
//! `Serialize`/`Deserialize`. This module holds the handful of types that
//! have no direct engine counterpart: query parameters, the webhook inlet
//! acknowledgement, and the aggregate health/metrics views.

use automation_core::{ExecutionStatus, OverallStatus, RuleId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Query parameters for `GET /rules`.
#[derive(Debug, Deserialize)]
pub struct RuleListParams {
    pub project_key: Option<String>,
    #[serde(default)]
    pub enabled_only: bool,
}

/// Query parameters for `GET /executions`.
#[derive(Debug, Deserialize)]
pub struct ExecutionListParams {
    pub rule_id: Option<RuleId>,
    pub status: Option<ExecutionStatus>,
    pub limit: Option<usize>,
}

/// Acknowledgement returned by `POST /webhooks/:inlet_id`. The inlet
/// dispatches fires asynchronously, so this only confirms the signature
/// verified and the payload was accepted, not that any rule finished.
#[derive(Debug, Serialize)]
pub struct WebhookInletResponse {
    pub accepted: bool,
    pub inlet_id: String,
}

/// Response body for `POST /integrations/:id/test`.
#[derive(Debug, Serialize)]
pub struct WebhookTestResponse {
    pub integration_id: String,
    pub delivered: bool,
    pub detail: Option<String>,
}

/// Response body for `GET /healthz`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: OverallStatus,
    pub checks: Vec<automation_core::CheckResult>,
}

/// Response body for `GET /metrics` and `GET /metrics/:rule_id`.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub metrics: HashMap<RuleId, automation_core::RuleMetrics>,
}

/// Response body for `POST /rules/validate`.
#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<automation_core::FieldError>,
}
