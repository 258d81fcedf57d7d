use super::*;
use crate::webhook::integration::{RetryPolicy, WebhookIntegrationSpec};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[tokio::test]
async fn successful_delivery_sends_expected_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = Arc::new(WebhookDispatcher::new());
    let integration = WebhookIntegration::from_spec(WebhookIntegrationSpec {
        name: "test".into(),
        url: server.uri(),
        secret: Some("shh".into()),
        events: Default::default(),
        headers: [("x-custom".to_string(), "v".to_string())].into_iter().collect(),
        retry_policy: RetryPolicy::default(),
        enabled: true,
    });
    dispatcher.register(integration).await;

    dispatcher.dispatch("issue_created", json!({"key": "ACME-1"})).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}

#[tokio::test]
async fn disabled_or_unsubscribed_integrations_are_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dispatcher = Arc::new(WebhookDispatcher::new());
    dispatcher
        .register(WebhookIntegration::from_spec(WebhookIntegrationSpec {
            name: "disabled".into(),
            url: server.uri(),
            secret: None,
            events: Default::default(),
            headers: Default::default(),
            retry_policy: RetryPolicy::default(),
            enabled: false,
        }))
        .await;
    dispatcher
        .register(WebhookIntegration::from_spec(WebhookIntegrationSpec {
            name: "unsubscribed".into(),
            url: server.uri(),
            secret: None,
            events: ["other_event".to_string()].into_iter().collect(),
            headers: Default::default(),
            retry_policy: RetryPolicy::default(),
            enabled: true,
        }))
        .await;

    dispatcher.dispatch("issue_created", json!({})).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}

#[tokio::test]
async fn failed_delivery_retries_until_success_with_growing_delay() {
    let server = MockServer::start().await;
    let attempt_count = std::sync::Arc::new(AtomicU32::new(0));
    let counter = attempt_count.clone();

    Mock::given(method("POST"))
        .respond_with(move |_: &Request| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                ResponseTemplate::new(500)
            } else {
                ResponseTemplate::new(200)
            }
        })
        .expect(3)
        .mount(&server)
        .await;

    let dispatcher = Arc::new(WebhookDispatcher::new());
    let integration = WebhookIntegration::from_spec(WebhookIntegrationSpec {
        name: "retrying".into(),
        url: server.uri(),
        secret: Some("shh".into()),
        events: Default::default(),
        headers: Default::default(),
        retry_policy: RetryPolicy {
            max_retries: 2,
            initial_delay_ms: 20,
            backoff_multiplier: 2.0,
            max_delay_ms: 1_000,
        },
        enabled: true,
    });
    dispatcher.register(integration).await;

    dispatcher.dispatch("issue_created", json!({"key": "ACME-1"})).await;

    // First attempt fails synchronously inside dispatch(); two retries
    // follow on the background worker with delays of 20ms then 40ms.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retries_resend_identical_signature_across_attempts() {
    use std::sync::Mutex as StdMutex;

    let server = MockServer::start().await;
    let attempt_count = std::sync::Arc::new(AtomicU32::new(0));
    let counter = attempt_count.clone();
    let seen_signatures: std::sync::Arc<StdMutex<Vec<String>>> = std::sync::Arc::new(StdMutex::new(Vec::new()));
    let signatures = seen_signatures.clone();

    Mock::given(method("POST"))
        .respond_with(move |req: &Request| {
            let sig = req
                .headers
                .get("X-Webhook-Signature")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            signatures.lock().unwrap().push(sig);
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                ResponseTemplate::new(500)
            } else {
                ResponseTemplate::new(200)
            }
        })
        .expect(3)
        .mount(&server)
        .await;

    let dispatcher = Arc::new(WebhookDispatcher::new());
    let integration = WebhookIntegration::from_spec(WebhookIntegrationSpec {
        name: "signed-retrying".into(),
        url: server.uri(),
        secret: Some("shh".into()),
        events: Default::default(),
        headers: Default::default(),
        retry_policy: RetryPolicy {
            max_retries: 2,
            initial_delay_ms: 20,
            backoff_multiplier: 2.0,
            max_delay_ms: 1_000,
        },
        enabled: true,
    });
    dispatcher.register(integration).await;

    dispatcher.dispatch("issue_created", json!({"key": "ACME-1"})).await;
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let signatures = seen_signatures.lock().unwrap();
    assert_eq!(signatures.len(), 3);
    assert!(signatures.iter().all(|s| s == &signatures[0]));
    assert!(!signatures[0].is_empty());
}

#[tokio::test]
async fn retries_are_dropped_after_max_retries_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dispatcher = Arc::new(WebhookDispatcher::new());
    let integration = WebhookIntegration::from_spec(WebhookIntegrationSpec {
        name: "always-fails".into(),
        url: server.uri(),
        secret: None,
        events: Default::default(),
        headers: Default::default(),
        retry_policy: RetryPolicy {
            max_retries: 1,
            initial_delay_ms: 5,
            backoff_multiplier: 2.0,
            max_delay_ms: 100,
        },
        enabled: true,
    });
    dispatcher.register(integration).await;

    dispatcher.dispatch("issue_created", json!({})).await;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    // Total attempts for one request <= max_retries + 1 == 2: the initial
    // synchronous attempt plus exactly one retry, then it's dropped.
}

#[tokio::test]
async fn verify_incoming_matches_sign() {
    let payload = r#"{"event":"x"}"#;
    let secret = "topsecret";
    let sig = crate::webhook::signature::sign(payload, secret);
    assert!(WebhookDispatcher::verify_incoming(payload, &sig, secret));
    assert!(!WebhookDispatcher::verify_incoming(payload, &sig, "wrong"));
}

#[tokio::test]
async fn register_update_delete_lifecycle() {
    let dispatcher = WebhookDispatcher::new();
    let integration = WebhookIntegration::from_spec(WebhookIntegrationSpec {
        name: "lifecycle".into(),
        url: "https://example.com".into(),
        secret: None,
        events: Default::default(),
        headers: Default::default(),
        retry_policy: RetryPolicy::default(),
        enabled: true,
    });
    let id = dispatcher.register(integration.clone()).await;
    assert!(dispatcher.get(id).await.is_some());

    let mut updated = integration.clone();
    updated.id = id;
    updated.name = "renamed".into();
    dispatcher.update(id, updated).await.unwrap();
    assert_eq!(dispatcher.get(id).await.unwrap().name, "renamed");

    dispatcher.delete(id).await.unwrap();
    assert!(dispatcher.get(id).await.is_none());
    assert!(matches!(
        dispatcher.delete(id).await.unwrap_err(),
        WebhookDispatchError::UnknownIntegration(_)
    ));
}
