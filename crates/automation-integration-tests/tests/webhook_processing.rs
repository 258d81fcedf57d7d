//! End-to-end webhook flows (spec §4.5, §4.9): inbound inlet delivery
//! with HMAC verification through to a fired execution, and outbound
//! integration delivery with retry/backoff against a flaky endpoint.

mod common;

use automation_core::webhook::signature;
use automation_core::webhook::integration::RetryPolicy;
use automation_core::{WebhookDispatcher, WebhookIntegration, WebhookIntegrationSpec};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn webhook_bound_rule_spec(inlet_id: &str, secret: &str) -> serde_json::Value {
    serde_json::json!({
        "name": "on inbound webhook",
        "description": null,
        "enabled": true,
        "project_scope": [],
        "triggers": [{
            "type": "WEBHOOK",
            "config": {"inlet_id": inlet_id, "secret": secret}
        }],
        "conditions": [],
        "actions": [{
            "type": "add-comment",
            "config": {"body": "fired from webhook"},
            "order": 0,
            "continue_on_error": false
        }],
        "created_by": "integration-tests"
    })
}

#[tokio::test]
async fn inbound_webhook_with_valid_signature_fires_bound_rule() {
    let tracker = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/issue/ACME-9/comment"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&tracker)
        .await;

    let state = common::test_app_state(&tracker).await;
    let app = automation_api::create_router(state);

    let create = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rules")
                .header("content-type", "application/json")
                .body(Body::from(webhook_bound_rule_spec("gh-inbox", "whsec").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::CREATED);

    let body = serde_json::json!({"issue_key": "ACME-9", "action": "opened"}).to_string();
    let signature = signature::sign(&body, "whsec");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/gh-inbox")
                .header("content-type", "application/json")
                .header("x-webhook-signature", signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let accepted: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(accepted["accepted"], true);

    // The fire is dispatched onto the engine's worker loop; give it a beat
    // to drain before asserting the execution landed.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = app
        .oneshot(Request::builder().uri("/executions").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let executions: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(executions.as_array().unwrap().len(), 1);
    assert_eq!(executions[0]["status"], "COMPLETED");
}

#[tokio::test]
async fn inbound_webhook_with_bad_signature_is_rejected() {
    let tracker = MockServer::start().await;
    let state = common::test_app_state(&tracker).await;
    let app = automation_api::create_router(state);

    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rules")
                .header("content-type", "application/json")
                .body(Body::from(webhook_bound_rule_spec("gh-inbox", "whsec").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let body = serde_json::json!({"issue_key": "ACME-9"}).to_string();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/gh-inbox")
                .header("content-type", "application/json")
                .header("x-webhook-signature", "sha256=deadbeef")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn outbound_delivery_retries_after_a_transient_failure() {
    let target = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&target)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&target)
        .await;

    let dispatcher = Arc::new(WebhookDispatcher::new());
    let integration = WebhookIntegration::from_spec(WebhookIntegrationSpec {
        name: "flaky-endpoint".to_string(),
        url: target.uri(),
        secret: Some("whsec".to_string()),
        events: Default::default(),
        headers: Default::default(),
        retry_policy: RetryPolicy {
            max_retries: 2,
            initial_delay_ms: 10,
            backoff_multiplier: 2.0,
            max_delay_ms: 100,
        },
        enabled: true,
    });
    dispatcher.register(integration).await;

    dispatcher.dispatch("issue.created", serde_json::json!({"issue_key": "ACME-1"})).await;

    // First attempt fails immediately and enqueues a retry after ~10ms;
    // give the background worker enough headroom to run it to success.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let requests = target.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2, "expected one failed attempt and one successful retry");
    assert!(requests[0].headers.contains_key("x-webhook-signature"));
}

#[tokio::test]
async fn test_delivery_bypasses_retry_queue_and_reports_failure_immediately() {
    let target = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&target)
        .await;

    let dispatcher = WebhookDispatcher::new();
    let integration = WebhookIntegration::from_spec(WebhookIntegrationSpec {
        name: "always-down".to_string(),
        url: target.uri(),
        secret: None,
        events: Default::default(),
        headers: Default::default(),
        retry_policy: Default::default(),
        enabled: true,
    });
    let id = dispatcher.register(integration).await;

    let result = dispatcher.test_delivery(id).await;
    assert!(result.is_err());

    let requests = target.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "test delivery must not retry");
}
