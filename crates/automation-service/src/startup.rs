//! Assembles `automation_api::AppState` from a [`ServiceConfig`]: one
//! composition point, so the binary and integration tests build the same
//! graph of collaborators.

use crate::config::ServiceConfig;
use crate::health;
use automation_api::{AppState, ServiceMetrics};
use automation_core::{AuditSink, DefaultPolicy, Engine, EngineConfig, FieldSchemaCache, PermissionGate, WebhookDispatcher};
use std::sync::Arc;
use thiserror::Error;
use tracker_client::{ClientConfig, TrackerClient};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("tracker client configuration error: {0}")]
    TrackerClient(#[from] tracker_client::ApiError),
    #[error("metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Default heap budget for the heap-usage health probe, absent a
/// dedicated config key in §6 — sized generously for a single-process
/// automation engine rather than tuned per deployment.
const HEAP_BUDGET_BYTES: u64 = 512 * 1024 * 1024;

pub fn build_app_state(config: &ServiceConfig) -> Result<AppState, StartupError> {
    let client_config = ClientConfig::builder()
        .base_url(config.tracker_base_url.clone())
        .auth(config.tracker_auth.clone())
        .timeout(config.request_timeout)
        .max_retries(config.max_retries)
        .initial_retry_delay(config.retry_delay)
        .build();
    let client = Arc::new(TrackerClient::new(client_config)?);

    let audit = if config.audit_enabled {
        Some(Arc::new(AuditSink::new(config.audit_dir.clone(), true)))
    } else {
        None
    };

    let engine_config = EngineConfig {
        max_concurrent_executions: config.max_concurrent_executions,
        retention_days: config.retention_days,
        execution_timeout: config.execution_timeout,
        ..EngineConfig::default()
    };
    let engine = Engine::with_audit(client.clone(), engine_config, audit.clone());

    let mut dispatcher = WebhookDispatcher::new();
    if let Some(audit) = &audit {
        dispatcher = dispatcher.with_audit(audit.clone());
    }
    let dispatcher = Arc::new(dispatcher);

    let permission_gate = Arc::new(PermissionGate::new(DefaultPolicy::default()));

    let field_schema = Arc::new(FieldSchemaCache::new((*client).clone()));
    let health_monitor = Arc::new(health::build_monitor(
        engine.clone(),
        field_schema,
        HEAP_BUDGET_BYTES,
        client.clone(),
        dispatcher.clone(),
    ));

    let metrics = ServiceMetrics::new()?;

    Ok(AppState {
        engine,
        dispatcher,
        permission_gate,
        health_monitor,
        metrics,
    })
}

/// Background sweep that periodically retires expired executions (§5
/// retention) and rate-limit windows. Runs for the lifetime of the process;
/// `main` does not await it, only holds the handle for a clean shutdown.
pub fn spawn_cleanup_sweep(engine: Arc<Engine>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            engine.cleanup().await;
        }
    })
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
