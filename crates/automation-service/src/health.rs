//! Binds the generic probes in `automation_core::health` to this process's
//! live signals: resident memory, scheduler-tick lag, the engine's
//! aggregate execution outcome rate, and the field-schema cache's hit
//! rate. None of these signals are exposed as `async fn`-friendly
//! snapshots by their owners, so each is sampled on its own background
//! tick into a plain atomic the probe closure can read synchronously.

use automation_core::{
    CacheHitRateProbe, CircuitBreakerProbe, Engine, ErrorRateProbe, FieldSchemaCache, HealthMonitor, HeapUsageProbe,
    SchedulerLagProbe, WebhookDispatcher,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracker_client::TrackerClient;

fn current_rss_bytes() -> u64 {
    let Ok(statm) = std::fs::read_to_string("/proc/self/statm") else {
        return 0;
    };
    let pages: u64 = statm
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    pages * 4096
}

fn spawn_scheduler_lag_sampler() -> Arc<AtomicU64> {
    let lag = Arc::new(AtomicU64::new(0));
    let reporter = lag.clone();
    tokio::spawn(async move {
        let tick = Duration::from_millis(200);
        let mut next = tokio::time::Instant::now() + tick;
        loop {
            tokio::time::sleep_until(next).await;
            let observed = tokio::time::Instant::now().saturating_duration_since(next).as_millis() as u64;
            reporter.store(observed, Ordering::Relaxed);
            next += tick;
        }
    });
    lag
}

fn spawn_error_rate_sampler(engine: Arc<Engine>) -> Arc<(AtomicU64, AtomicU64)> {
    let counters = Arc::new((AtomicU64::new(0), AtomicU64::new(0)));
    let reporter = counters.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            let metrics = engine.get_metrics(None).await;
            let total: u64 = metrics.values().map(|m| m.execution_count).sum();
            let failures: u64 = metrics.values().map(|m| m.failure_count).sum();
            reporter.0.store(failures, Ordering::Relaxed);
            reporter.1.store(total, Ordering::Relaxed);
        }
    });
    counters
}

/// Assemble the Health Monitor with all default probes wired to this
/// process, budgeting heap usage at `heap_budget_bytes` (spec: warn above
/// 80%, fail above 90% of budget). The tracker client and webhook
/// dispatcher each contribute a `CircuitBreakerProbe` so a tripped breaker
/// shows up as a degraded health check rather than only in logs.
pub fn build_monitor(
    engine: Arc<Engine>,
    field_schema: Arc<FieldSchemaCache>,
    heap_budget_bytes: u64,
    tracker: Arc<TrackerClient>,
    dispatcher: Arc<WebhookDispatcher>,
) -> HealthMonitor {
    let lag = spawn_scheduler_lag_sampler();
    let error_counters = spawn_error_rate_sampler(engine);

    HealthMonitor::new()
        .register(Arc::new(HeapUsageProbe {
            budget_bytes: heap_budget_bytes,
            current_bytes_fn: Arc::new(current_rss_bytes),
        }))
        .register(Arc::new(SchedulerLagProbe {
            lag_ms_fn: Arc::new(move || lag.load(Ordering::Relaxed)),
        }))
        .register(Arc::new(ErrorRateProbe {
            unresolved_and_total_fn: Arc::new(move || {
                (error_counters.0.load(Ordering::Relaxed), error_counters.1.load(Ordering::Relaxed))
            }),
        }))
        .register(Arc::new(CacheHitRateProbe {
            hit_rate_fn: Arc::new(move || field_schema.hit_rate()),
        }))
        .register(Arc::new(CircuitBreakerProbe {
            name: "tracker_circuit_breaker".to_string(),
            state_fn: Arc::new(move || tracker.circuit_state()),
        }))
        .register(Arc::new(CircuitBreakerProbe {
            name: "webhook_dispatch_circuit_breaker".to_string(),
            state_fn: Arc::new(move || dispatcher.circuit_state()),
        }))
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
