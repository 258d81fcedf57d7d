//! Outbound webhook dispatcher (C5, §4.5): signed HTTP delivery with a
//! per-integration FIFO retry queue and exponential backoff.
//!
//! Delivery is always local and at-least-once, never exactly-once (§1
//! Non-goals): a failed delivery is queued for retry, not persisted to an
//! external broker.

use crate::audit::{AuditSink, EventKind, Outcome as AuditOutcome};
use crate::model::IntegrationId;
use crate::webhook::integration::WebhookIntegration;
use crate::webhook::signature::{self, WebhookPayload};
use reqwest::Client;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracker_client::circuit_breaker::{
    webhook_dispatch_circuit_breaker_config, CircuitBreaker, CircuitBreakerError, DefaultCircuitBreaker,
    DefaultCircuitBreakerFactory,
};
use tracing::{instrument, warn};

#[derive(Debug, Error)]
pub enum WebhookDispatchError {
    #[error("unknown webhook integration: {0}")]
    UnknownIntegration(IntegrationId),
    #[error("integration is disabled: {0}")]
    IntegrationDisabled(IntegrationId),
    #[error("test delivery to {0} failed: {1}")]
    DeliveryFailed(IntegrationId, String),
}

#[derive(Debug, Clone)]
struct RetryItem {
    event: String,
    data: Value,
    /// Timestamp of the original delivery attempt, carried through every
    /// retry so a retried request resends the byte-identical payload (and
    /// therefore the same `X-Webhook-Signature`) rather than minting a new
    /// timestamp per attempt.
    timestamp: chrono::DateTime<chrono::Utc>,
    attempt: u32,
}

/// Per-integration retry queue plus a flag recording whether a retry
/// worker is currently scheduled, so at most one timer exists per
/// integration at a time (spec §4.5 step 4).
#[derive(Default)]
struct IntegrationQueue {
    pending: VecDeque<RetryItem>,
    worker_scheduled: bool,
}

pub struct WebhookDispatcher {
    http: Client,
    integrations: RwLock<HashMap<IntegrationId, WebhookIntegration>>,
    queues: RwLock<HashMap<IntegrationId, Arc<Mutex<IntegrationQueue>>>>,
    audit: Option<Arc<AuditSink>>,
    /// Guards every outbound delivery attempt: a target down hard enough
    /// to trip this stops eating retry-queue slots until it recovers
    /// (spec §4.11 ties breaker state into the Health Monitor probes).
    circuit_breaker: DefaultCircuitBreaker<(), String>,
}

impl WebhookDispatcher {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            integrations: RwLock::new(HashMap::new()),
            queues: RwLock::new(HashMap::new()),
            audit: None,
            circuit_breaker: DefaultCircuitBreakerFactory
                .create_typed_circuit_breaker(webhook_dispatch_circuit_breaker_config()),
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub async fn register(&self, integration: WebhookIntegration) -> IntegrationId {
        let id = integration.id;
        self.integrations.write().await.insert(id, integration);
        id
    }

    pub async fn update(&self, id: IntegrationId, integration: WebhookIntegration) -> Result<(), WebhookDispatchError> {
        let mut integrations = self.integrations.write().await;
        if !integrations.contains_key(&id) {
            return Err(WebhookDispatchError::UnknownIntegration(id));
        }
        integrations.insert(id, integration);
        Ok(())
    }

    pub async fn delete(&self, id: IntegrationId) -> Result<(), WebhookDispatchError> {
        let removed = self.integrations.write().await.remove(&id);
        self.queues.write().await.remove(&id);
        removed
            .map(|_| ())
            .ok_or(WebhookDispatchError::UnknownIntegration(id))
    }

    pub async fn get(&self, id: IntegrationId) -> Option<WebhookIntegration> {
        self.integrations.read().await.get(&id).cloned()
    }

    pub async fn list(&self) -> Vec<WebhookIntegration> {
        self.integrations.read().await.values().cloned().collect()
    }

    /// Current circuit breaker state, exposed for the Health Monitor's
    /// `CircuitBreakerProbe` (spec §4.11).
    pub fn circuit_state(&self) -> tracker_client::circuit_breaker::CircuitState {
        self.circuit_breaker.state()
    }

    /// Deliver `event`/`data` to every enabled integration subscribed to
    /// `event`. Failures enqueue for background retry rather than
    /// propagating to the caller (spec: at-least-once, not exactly-once).
    pub async fn dispatch(self: &Arc<Self>, event: &str, data: Value) {
        let integrations: Vec<WebhookIntegration> = self
            .integrations
            .read()
            .await
            .values()
            .filter(|i| i.enabled && i.subscribes_to(event))
            .cloned()
            .collect();

        for integration in integrations {
            self.send_or_enqueue(&integration, event.to_string(), data.clone(), 0)
                .await;
        }
    }

    #[instrument(skip(self, data))]
    async fn send_or_enqueue(self: &Arc<Self>, integration: &WebhookIntegration, event: String, data: Value, attempt: u32) {
        let payload = WebhookPayload::new(event.clone(), data.clone(), integration.id.to_string());
        match self.deliver_guarded(integration, &payload).await {
            Ok(()) => {
                self.audit_delivery(integration, &event, AuditOutcome::Success).await;
            }
            Err(_) => {
                self.audit_delivery(integration, &event, AuditOutcome::Failure).await;
                self.enqueue_and_maybe_spawn(
                    integration.id,
                    RetryItem {
                        event,
                        data,
                        timestamp: payload.timestamp,
                        attempt,
                    },
                )
                .await;
            }
        }
    }

    async fn deliver_once(&self, integration: &WebhookIntegration, payload: &WebhookPayload) -> Result<(), String> {
        let serialized = payload.serialize();

        let mut request = self
            .http
            .post(&integration.url)
            .header("content-type", "application/json")
            .header("user-agent", concat!("tracker-automation-engine/", env!("CARGO_PKG_VERSION")))
            .header("X-Webhook-Event", &payload.event)
            .header("X-Webhook-ID", integration.id.to_string());

        for (k, v) in &integration.headers {
            request = request.header(k, v);
        }
        if let Some(secret) = &integration.secret {
            request = request.header("X-Webhook-Signature", signature::sign(&serialized, secret));
        }

        let response = request
            .body(serialized)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if (200..300).contains(&response.status().as_u16()) {
            Ok(())
        } else {
            Err(format!("webhook delivery failed with status {}", response.status()))
        }
    }

    /// `deliver_once`, wrapped by the circuit breaker. All three delivery
    /// paths (initial dispatch, retry worker, test delivery) go through
    /// this rather than calling `deliver_once` directly.
    async fn deliver_guarded(&self, integration: &WebhookIntegration, payload: &WebhookPayload) -> Result<(), String> {
        match self.circuit_breaker.call(|| self.deliver_once(integration, payload)).await {
            Ok(()) => Ok(()),
            Err(CircuitBreakerError::OperationFailed(e)) => Err(e),
            Err(CircuitBreakerError::CircuitOpen) | Err(CircuitBreakerError::TooManyConcurrentRequests) => {
                Err("circuit breaker open for webhook dispatch".to_string())
            }
            Err(CircuitBreakerError::Timeout { timeout_ms }) => {
                Err(format!("webhook delivery timed out after {timeout_ms}ms"))
            }
        }
    }

    async fn enqueue_and_maybe_spawn(self: &Arc<Self>, integration_id: IntegrationId, item: RetryItem) {
        let queue = self.queue_for(integration_id).await;
        let mut should_spawn = false;
        {
            let mut guard = queue.lock().await;
            guard.pending.push_back(item);
            if !guard.worker_scheduled {
                guard.worker_scheduled = true;
                should_spawn = true;
            }
        }
        if should_spawn {
            let dispatcher = self.clone();
            tokio::spawn(async move {
                dispatcher.run_retry_worker(integration_id).await;
            });
        }
    }

    async fn queue_for(&self, integration_id: IntegrationId) -> Arc<Mutex<IntegrationQueue>> {
        let mut queues = self.queues.write().await;
        queues
            .entry(integration_id)
            .or_insert_with(|| Arc::new(Mutex::new(IntegrationQueue::default())))
            .clone()
    }

    /// One retry worker per integration, serialized: dequeue one item at a
    /// time, wait `delay(attempt)`, retry; on success continue to the next
    /// item; on exhaustion drop with a final error log (spec §4.5 step 5).
    async fn run_retry_worker(self: Arc<Self>, integration_id: IntegrationId) {
        loop {
            let queue = self.queue_for(integration_id).await;
            let item = {
                let mut guard = queue.lock().await;
                match guard.pending.pop_front() {
                    Some(item) => item,
                    None => {
                        guard.worker_scheduled = false;
                        return;
                    }
                }
            };

            let integration = match self.get(integration_id).await {
                Some(i) => i,
                None => return,
            };

            let delay_ms = integration.retry_policy.delay_ms(item.attempt);
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;

            let payload = WebhookPayload {
                event: item.event.clone(),
                data: item.data.clone(),
                timestamp: item.timestamp,
                webhook_id: integration.id.to_string(),
            };
            let next_attempt = item.attempt + 1;
            match self.deliver_guarded(&integration, &payload).await {
                Ok(()) => {
                    self.audit_delivery(&integration, &item.event, AuditOutcome::Success).await;
                }
                Err(_) if next_attempt <= integration.retry_policy.max_retries => {
                    let mut guard = queue.lock().await;
                    guard.pending.push_front(RetryItem {
                        event: item.event,
                        data: item.data,
                        timestamp: item.timestamp,
                        attempt: next_attempt,
                    });
                }
                Err(e) => {
                    warn!(integration = %integration_id, error = %e, "webhook delivery exhausted retries, dropping");
                    self.audit_delivery(&integration, &item.event, AuditOutcome::Failure).await;
                }
            }
        }
    }

    async fn audit_delivery(&self, integration: &WebhookIntegration, event: &str, outcome: AuditOutcome) {
        if let Some(audit) = &self.audit {
            let _ = audit
                .record(
                    EventKind::ToolExecution,
                    "webhook.delivery",
                    None,
                    "webhook_dispatch",
                    Some(integration.id.to_string()),
                    outcome,
                    serde_json::json!({"event": event, "integration": integration.name}),
                    None,
                )
                .await;
        }
    }

    /// Verify an inbound webhook's signature against a configured inlet
    /// secret (spec §4.5 "Incoming webhook verification").
    pub fn verify_incoming(serialized_payload: &str, signature_header: &str, secret: &str) -> bool {
        signature::verify(serialized_payload, signature_header, secret)
    }

    /// Send a single synthetic test event directly to `id`, bypassing its
    /// `events` subscription filter and the retry queue: the CLI/HTTP "test
    /// this integration" operation wants an immediate, synchronous
    /// pass/fail, not a queued best-effort delivery.
    pub async fn test_delivery(&self, id: IntegrationId) -> Result<(), WebhookDispatchError> {
        let integration = self
            .integrations
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(WebhookDispatchError::UnknownIntegration(id))?;
        if !integration.enabled {
            return Err(WebhookDispatchError::IntegrationDisabled(id));
        }
        let data = serde_json::json!({ "message": "test delivery" });
        let payload = WebhookPayload::new("test", data, integration.id.to_string());
        match self.deliver_guarded(&integration, &payload).await {
            Ok(()) => {
                self.audit_delivery(&integration, "test", AuditOutcome::Success).await;
                Ok(())
            }
            Err(e) => {
                self.audit_delivery(&integration, "test", AuditOutcome::Failure).await;
                Err(WebhookDispatchError::DeliveryFailed(id, e))
            }
        }
    }
}

impl Default for WebhookDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
