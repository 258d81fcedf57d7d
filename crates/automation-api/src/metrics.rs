//! Prometheus metrics for the HTTP layer and the engine it fronts.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

#[derive(Debug)]
pub struct ServiceMetrics {
    pub http_requests_total: IntCounterVec,
    pub http_request_duration: Histogram,

    pub rules_executed_total: IntCounter,
    pub rule_execution_failures_total: IntCounter,
    pub active_rules: IntGauge,

    pub webhook_inbound_total: IntCounterVec,
    pub webhook_outbound_total: IntCounterVec,

    pub permission_denied_total: IntCounter,
    pub rate_limited_total: IntCounter,
}

impl ServiceMetrics {
    /// Registers metrics against the process-wide default registry, the way
    /// `/metrics/prometheus` scrapes are expected to find them.
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        Self::for_registry(prometheus::default_registry())
    }

    /// Registers metrics against an arbitrary registry. Tests use their own
    /// fresh `Registry` so repeated construction within one test binary
    /// doesn't collide on the global default registry's metric names.
    pub fn for_registry(registry: &Registry) -> Result<Arc<Self>, prometheus::Error> {
        let http_requests_total = IntCounterVec::new(
            Opts::new("automation_http_requests_total", "Total number of HTTP requests handled"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration = Histogram::with_opts(
            HistogramOpts::new("automation_http_request_duration_seconds", "HTTP request processing time")
                .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(http_request_duration.clone()))?;

        let rules_executed_total =
            IntCounter::new("automation_rules_executed_total", "Total rule executions across all rules")?;
        registry.register(Box::new(rules_executed_total.clone()))?;

        let rule_execution_failures_total = IntCounter::new(
            "automation_rule_execution_failures_total",
            "Total rule executions ending in FAILED",
        )?;
        registry.register(Box::new(rule_execution_failures_total.clone()))?;

        let active_rules = IntGauge::new("automation_active_rules", "Number of currently enabled rules")?;
        registry.register(Box::new(active_rules.clone()))?;

        let webhook_inbound_total = IntCounterVec::new(
            Opts::new("automation_webhook_inbound_total", "Inbound webhooks received by inlet"),
            &["inlet_id", "accepted"],
        )?;
        registry.register(Box::new(webhook_inbound_total.clone()))?;

        let webhook_outbound_total = IntCounterVec::new(
            Opts::new("automation_webhook_outbound_total", "Outbound webhook deliveries by integration"),
            &["integration_id", "outcome"],
        )?;
        registry.register(Box::new(webhook_outbound_total.clone()))?;

        let permission_denied_total = IntCounter::new(
            "automation_permission_denied_total",
            "Requests rejected by the permission gate",
        )?;
        registry.register(Box::new(permission_denied_total.clone()))?;

        let rate_limited_total =
            IntCounter::new("automation_rate_limited_total", "Requests rejected by the rate limiter")?;
        registry.register(Box::new(rate_limited_total.clone()))?;

        Ok(Arc::new(Self {
            http_requests_total,
            http_request_duration,
            rules_executed_total,
            rule_execution_failures_total,
            active_rules,
            webhook_inbound_total,
            webhook_outbound_total,
            permission_denied_total,
            rate_limited_total,
        }))
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration: std::time::Duration) {
        self.http_requests_total
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
        self.http_request_duration.observe(duration.as_secs_f64());
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
