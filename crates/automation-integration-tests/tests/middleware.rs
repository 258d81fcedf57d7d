//! Middleware stack wrapping the router (§4.2, §6): metrics recording,
//! permission-gate enforcement at the edge, and the CORS/compression
//! layers wired around `tower_http`.

mod common;

use automation_api::create_router;
use automation_core::{PrincipalId, PrincipalPolicy};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

#[tokio::test]
async fn permissive_cors_headers_present() {
    let server = wiremock::MockServer::start().await;
    let state = common::test_app_state(&server).await;
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/rules")
                .header("origin", "https://example.com")
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn http_request_metrics_are_recorded() {
    let server = wiremock::MockServer::start().await;
    let state = common::test_app_state(&server).await;
    let metrics = state.metrics.clone();
    let app = create_router(state);

    let before = metrics
        .http_requests_total
        .with_label_values(&["GET", "/rules", "200"])
        .get();

    let response = app
        .oneshot(Request::builder().uri("/rules").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let after = metrics
        .http_requests_total
        .with_label_values(&["GET", "/rules", "200"])
        .get();
    assert_eq!(after, before + 1);
}

#[tokio::test]
async fn denied_principal_is_rejected_before_reaching_the_engine() {
    let server = wiremock::MockServer::start().await;
    let state = common::test_app_state(&server).await;
    state
        .permission_gate
        .set_principal_policy(
            PrincipalId::new("blocked"),
            PrincipalPolicy {
                allow_list: None,
                deny_list: Some(["rule.create".to_string()].into_iter().collect()),
                read_only: false,
                max_rpm: None,
            },
        )
        .await;
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rules")
                .header("content-type", "application/json")
                .header("x-principal-id", "blocked")
                .body(Body::from(common::manual_comment_rule_spec().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["category"], "permission");
}

#[tokio::test]
async fn read_only_principal_may_still_list_rules() {
    let server = wiremock::MockServer::start().await;
    let state = common::test_app_state(&server).await;
    state
        .permission_gate
        .set_principal_policy(
            PrincipalId::new("viewer"),
            PrincipalPolicy {
                allow_list: None,
                deny_list: None,
                read_only: true,
                max_rpm: None,
            },
        )
        .await;
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/rules")
                .header("x-principal-id", "viewer")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
