//! Shared fixtures for the cross-crate integration tests: a real
//! `AppState` (engine + dispatcher + permission gate + health monitor)
//! wired against a `wiremock` stand-in for the tracker, the way
//! `automation_service::startup::build_app_state` wires it in production.

#![allow(dead_code)]

use automation_api::{AppState, ServiceMetrics};
use automation_core::{DefaultPolicy, Engine, EngineConfig, HealthMonitor, PermissionGate, WebhookDispatcher};
use prometheus::Registry;
use std::sync::Arc;
use std::time::Duration;
use tracker_client::{AuthMethod, ClientConfig, TrackerClient};
use wiremock::MockServer;

/// Build an `AppState` whose tracker client points at `server`, the
/// in-memory stand-in for the tracker REST API every test drives against.
pub async fn test_app_state(server: &MockServer) -> AppState {
    let client_config = ClientConfig::builder()
        .base_url(server.uri())
        .auth(AuthMethod::OAuthBearer {
            token: "integration-test-token".into(),
        })
        .timeout(Duration::from_millis(5_000))
        .max_retries(1)
        .build();
    let client = Arc::new(TrackerClient::new(client_config).expect("valid client config"));
    let engine = Engine::new(client, EngineConfig::default());
    engine.start().await;

    AppState {
        engine,
        dispatcher: Arc::new(WebhookDispatcher::new()),
        permission_gate: Arc::new(PermissionGate::new(DefaultPolicy::default())),
        health_monitor: Arc::new(HealthMonitor::new()),
        metrics: ServiceMetrics::for_registry(&Registry::new()).expect("fresh registry per test"),
    }
}

/// A minimal valid `RuleSpec` body, manually triggered, that adds a
/// comment to `context.issue_key` — the smallest pipeline that exercises
/// create -> execute -> history end to end.
pub fn manual_comment_rule_spec() -> serde_json::Value {
    serde_json::json!({
        "name": "integration test rule",
        "description": null,
        "enabled": true,
        "project_scope": [],
        "triggers": [{"type": "MANUAL", "config": {}}],
        "conditions": [],
        "actions": [{
            "type": "add-comment",
            "config": {"body": "hello from integration test"},
            "order": 0,
            "continue_on_error": false
        }],
        "created_by": "integration-tests"
    })
}

pub fn execution_context_for(issue_key: &str) -> serde_json::Value {
    serde_json::json!({
        "issue_key": issue_key,
        "project_key": null,
        "user_id": null,
        "webhook_payload": null,
        "trigger_payload": null,
        "custom": {}
    })
}
