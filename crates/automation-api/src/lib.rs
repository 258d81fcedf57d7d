//! HTTP surface for the tracker automation engine.
//!
//! Wires `automation_core::Engine` and its collaborators (the webhook
//! dispatcher, permission gate, health monitor) behind an axum router. Every
//! write operation is gated through the permission gate using the caller
//! identity carried in the `X-Principal-Id` header (anonymous when absent),
//! the way the engine's own gating primitives (§4.2) are meant to be
//! invoked at the edge rather than from inside the pipeline.

pub mod errors;
pub mod metrics;
pub mod responses;

use automation_core::{
    AutomationError, Engine, ExecutionFilter, HealthMonitor, PermissionGate, PrincipalId, RuleFilter, RuleId,
    RulePatch, RuleSpec, WebhookDispatcher, WebhookIntegration, WebhookIntegrationSpec,
};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use bytes::Bytes;
use prometheus::TextEncoder;
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use tracing::{info, instrument, warn};

pub use errors::ApiError;
pub use metrics::ServiceMetrics;
pub use responses::{
    ExecutionListParams, HealthResponse, MetricsResponse, RuleListParams, ValidationResponse, WebhookInletResponse,
    WebhookTestResponse,
};

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server failed: {0}")]
    ServerFailed(std::io::Error),
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub dispatcher: Arc<WebhookDispatcher>,
    pub permission_gate: Arc<PermissionGate>,
    pub health_monitor: Arc<HealthMonitor>,
    pub metrics: Arc<ServiceMetrics>,
}

fn principal_from_headers(headers: &HeaderMap) -> PrincipalId {
    headers
        .get("x-principal-id")
        .and_then(|v| v.to_str().ok())
        .map(PrincipalId::new)
        .unwrap_or_else(|| PrincipalId::new("anonymous"))
}

async fn authorize(state: &AppState, principal: &PrincipalId, op_name: &str) -> Result<(), ApiError> {
    let decision = state.permission_gate.check(principal, op_name).await;
    if !decision.allowed {
        let reason = decision.reason.unwrap_or_else(|| "denied".to_string());
        if reason == "rate limit" {
            state.metrics.rate_limited_total.inc();
            return Err(ApiError(AutomationError::RateLimit { retry_after_ms: 1_000 }));
        }
        state.metrics.permission_denied_total.inc();
        return Err(ApiError(AutomationError::Permission { reason }));
    }
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/webhooks/{inlet_id}", post(handle_inbound_webhook))
        .route("/rules", post(create_rule).get(list_rules))
        .route("/rules/validate", post(validate_rule))
        .route("/rules/{id}", get(get_rule).put(update_rule).delete(delete_rule))
        .route("/rules/{id}/execute", post(execute_rule))
        .route("/executions", get(list_executions))
        .route("/metrics", get(get_metrics_all))
        .route("/metrics/{rule_id}", get(get_metrics_one))
        .route("/bulk-operations/{id}", get(get_bulk_progress))
        .route("/integrations", post(register_integration))
        .route("/integrations/{id}", put(update_integration).delete(delete_integration))
        .route("/integrations/{id}/test", post(test_integration))
        .route("/healthz", get(healthz))
        .route("/metrics/prometheus", get(metrics_prometheus));

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .layer(axum::middleware::from_fn_with_state(state.clone(), record_http_metrics))
                .into_inner(),
        )
        .with_state(state)
}

async fn record_http_metrics(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(request).await;
    state
        .metrics
        .record_http_request(&method, &path, response.status().as_u16(), start.elapsed());
    response
}

pub async fn start_server(addr: SocketAddr, state: AppState) -> Result<(), ServiceError> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServiceError::BindFailed {
            address: addr.to_string(),
            source,
        })?;

    info!(%addr, "automation-api listening");

    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
        };
        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("received SIGINT, shutting down"),
            _ = terminate => info!("received SIGTERM, shutting down"),
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(ServiceError::ServerFailed)?;

    info!("automation-api shutdown complete");
    Ok(())
}

// ---------------------------------------------------------------------
// Rule CRUD
// ---------------------------------------------------------------------

#[instrument(skip(state, spec))]
async fn create_rule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(spec): Json<RuleSpec>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from_headers(&headers);
    authorize(&state, &principal, "rule.create").await?;
    let rule = state.engine.create_rule(spec).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

#[instrument(skip(state))]
async fn list_rules(
    State(state): State<AppState>,
    Query(params): Query<RuleListParams>,
) -> impl IntoResponse {
    let filter = RuleFilter {
        project_key: params.project_key,
        enabled_only: params.enabled_only,
    };
    Json(state.engine.get_rules(filter).await)
}

#[instrument(skip(state))]
async fn get_rule(State(state): State<AppState>, Path(id): Path<RuleId>) -> Result<impl IntoResponse, ApiError> {
    state
        .engine
        .get_rule(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError(AutomationError::not_found("rule", id.to_string())))
}

#[instrument(skip(state, patch))]
async fn update_rule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RuleId>,
    Json(patch): Json<RulePatch>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from_headers(&headers);
    authorize(&state, &principal, "rule.update").await?;
    let rule = state.engine.update_rule(id, patch).await?;
    Ok(Json(rule))
}

#[instrument(skip(state))]
async fn delete_rule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RuleId>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from_headers(&headers);
    authorize(&state, &principal, "rule.delete").await?;
    state.engine.delete_rule(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, spec))]
async fn validate_rule(State(state): State<AppState>, Json(spec): Json<RuleSpec>) -> impl IntoResponse {
    match state.engine.validate_rule(&spec) {
        Ok(()) => Json(ValidationResponse {
            valid: true,
            errors: Vec::new(),
        }),
        Err(errors) => Json(ValidationResponse { valid: false, errors }),
    }
}

#[instrument(skip(state, ctx))]
async fn execute_rule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<RuleId>,
    Json(ctx): Json<automation_core::ExecutionContext>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from_headers(&headers);
    authorize(&state, &principal, "rule.execute").await?;
    let execution = state.engine.execute_rule(id, ctx).await?;
    Ok(Json(execution))
}

// ---------------------------------------------------------------------
// Executions, metrics, bulk progress
// ---------------------------------------------------------------------

#[instrument(skip(state))]
async fn list_executions(State(state): State<AppState>, Query(params): Query<ExecutionListParams>) -> impl IntoResponse {
    let filter = ExecutionFilter {
        rule_id: params.rule_id,
        status: params.status,
    };
    Json(state.engine.get_executions(filter, params.limit).await)
}

#[instrument(skip(state))]
async fn get_metrics_all(State(state): State<AppState>) -> impl IntoResponse {
    Json(MetricsResponse {
        metrics: state.engine.get_metrics(None).await,
    })
}

#[instrument(skip(state))]
async fn get_metrics_one(State(state): State<AppState>, Path(rule_id): Path<RuleId>) -> impl IntoResponse {
    Json(MetricsResponse {
        metrics: state.engine.get_metrics(Some(rule_id)).await,
    })
}

#[instrument(skip(state))]
async fn get_bulk_progress(
    State(state): State<AppState>,
    Path(id): Path<automation_core::BulkOperationId>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .engine
        .get_bulk_progress(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError(AutomationError::not_found("bulk_operation", id.to_string())))
}

// ---------------------------------------------------------------------
// Webhook integrations (outbound) and inlets (inbound)
// ---------------------------------------------------------------------

#[instrument(skip(state, spec))]
async fn register_integration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(spec): Json<WebhookIntegrationSpec>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from_headers(&headers);
    authorize(&state, &principal, "integration.create").await?;
    let integration = WebhookIntegration::from_spec(spec);
    state.dispatcher.register(integration.clone()).await;
    Ok((StatusCode::CREATED, Json(integration)))
}

#[instrument(skip(state, integration))]
async fn update_integration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<automation_core::IntegrationId>,
    Json(integration): Json<WebhookIntegration>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from_headers(&headers);
    authorize(&state, &principal, "integration.update").await?;
    state
        .dispatcher
        .update(id, integration)
        .await
        .map_err(|_| ApiError(AutomationError::not_found("integration", id.to_string())))?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
async fn delete_integration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<automation_core::IntegrationId>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from_headers(&headers);
    authorize(&state, &principal, "integration.delete").await?;
    state
        .dispatcher
        .delete(id)
        .await
        .map_err(|_| ApiError(AutomationError::not_found("integration", id.to_string())))?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
async fn test_integration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<automation_core::IntegrationId>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = principal_from_headers(&headers);
    authorize(&state, &principal, "integration.test").await?;
    match state.dispatcher.test_delivery(id).await {
        Ok(()) => Ok(Json(WebhookTestResponse {
            integration_id: id.to_string(),
            delivered: true,
            detail: None,
        })),
        Err(automation_core::WebhookDispatchError::UnknownIntegration(_)) => {
            Err(ApiError(AutomationError::not_found("integration", id.to_string())))
        }
        Err(e) => Ok(Json(WebhookTestResponse {
            integration_id: id.to_string(),
            delivered: false,
            detail: Some(e.to_string()),
        })),
    }
}

#[instrument(skip(state, body))]
async fn handle_inbound_webhook(
    State(state): State<AppState>,
    Path(inlet_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body_str = String::from_utf8_lossy(&body).to_string();
    let payload: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    let signature = headers
        .get("x-webhook-signature")
        .and_then(|v| v.to_str().ok());

    let accepted = state
        .engine
        .trigger_manager()
        .handle_webhook(&inlet_id, &body_str, signature, payload)
        .await;

    if !accepted {
        warn!(inlet_id = %inlet_id, "webhook signature verification failed");
        return Err(ApiError(AutomationError::Permission {
            reason: "webhook signature verification failed".to_string(),
        }));
    }

    Ok(Json(WebhookInletResponse { accepted, inlet_id }))
}

// ---------------------------------------------------------------------
// Health and metrics export
// ---------------------------------------------------------------------

#[instrument(skip(state))]
async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let (status, checks) = state.health_monitor.run().await;
    let http_status = match status {
        automation_core::OverallStatus::Healthy => StatusCode::OK,
        automation_core::OverallStatus::Degraded => StatusCode::OK,
        automation_core::OverallStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (http_status, Json(HealthResponse { status, checks }))
}

#[instrument(skip_all)]
async fn metrics_prometheus() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
