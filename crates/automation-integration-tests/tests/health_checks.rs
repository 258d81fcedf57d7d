//! `GET /healthz` wired with the real default probes from
//! `automation_service::health::build_monitor` (spec §4.11), not the bare
//! `HealthMonitor::new()` the other integration tests use when health
//! status isn't the thing under test.

mod common;

use automation_api::{create_router, AppState, ServiceMetrics};
use automation_core::{DefaultPolicy, Engine, EngineConfig, OverallStatus, PermissionGate, WebhookDispatcher};
use automation_service::health::build_monitor;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use prometheus::Registry;
use std::sync::Arc;
use tower::ServiceExt;
use tracker_client::{AuthMethod, ClientConfig, TrackerClient};

async fn state_with_real_probes(server: &wiremock::MockServer) -> AppState {
    let client_config = ClientConfig::builder()
        .base_url(server.uri())
        .auth(AuthMethod::OAuthBearer { token: "t".into() })
        .build();
    let client = Arc::new(TrackerClient::new(client_config).unwrap());
    let engine = Engine::new(client.clone(), EngineConfig::default());
    let field_schema = Arc::new(automation_core::FieldSchemaCache::new((*client).clone()));
    let health_monitor = Arc::new(build_monitor(engine.clone(), field_schema, 512 * 1024 * 1024));

    AppState {
        engine,
        dispatcher: Arc::new(WebhookDispatcher::new()),
        permission_gate: Arc::new(PermissionGate::new(DefaultPolicy::default())),
        health_monitor,
        metrics: ServiceMetrics::for_registry(&Registry::new()).unwrap(),
    }
}

#[tokio::test]
async fn healthz_reports_healthy_with_fresh_process_signals() {
    let server = wiremock::MockServer::start().await;
    let state = state_with_real_probes(&server).await;
    let app = create_router(state);

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], serde_json::to_value(OverallStatus::Healthy).unwrap());
    let checks = body["checks"].as_array().unwrap();
    let names: Vec<&str> = checks.iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"heap_usage"));
    assert!(names.contains(&"scheduler_tick_lag"));
    assert!(names.contains(&"error_rate"));
    assert!(names.contains(&"cache_hit_rate"));
}

#[tokio::test]
async fn healthz_on_bare_monitor_is_healthy_with_no_checks() {
    let server = wiremock::MockServer::start().await;
    let state = common::test_app_state(&server).await;
    let app = create_router(state);

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["checks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn prometheus_metrics_endpoint_serves_text_format() {
    let server = wiremock::MockServer::start().await;
    let state = common::test_app_state(&server).await;
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics/prometheus")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
