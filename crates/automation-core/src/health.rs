//! Health Monitor (C11, spec §4.11): registered checks aggregated into an
//! overall status, with default probes for heap usage, scheduler-tick lag,
//! error rate, and field-schema cache hit-rate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracker_client::circuit_breaker::CircuitState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// A single probe's verdict, reported by name alongside `CheckStatus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub detail: Option<String>,
}

/// A registered probe: measures one signal and returns its verdict. Probes
/// marked `critical` drive the check down to `unhealthy` on failure; others
/// only ever degrade the overall status.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &str;
    fn critical(&self) -> bool;
    fn timeout(&self) -> Duration;
    fn interval(&self) -> Duration;
    async fn check(&self) -> CheckResult;
}

pub struct HealthMonitor {
    probes: Vec<Arc<dyn HealthProbe>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self { probes: Vec::new() }
    }

    pub fn register(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    /// Run every registered probe (bounded by its own timeout) and fold the
    /// results into an overall status: `unhealthy` if any critical probe
    /// failed, `degraded` if any probe warned or a non-critical probe
    /// failed, else `healthy`.
    pub async fn run(&self) -> (OverallStatus, Vec<CheckResult>) {
        let mut results = Vec::with_capacity(self.probes.len());
        for probe in &self.probes {
            let result = match tokio::time::timeout(probe.timeout(), probe.check()).await {
                Ok(r) => r,
                Err(_) => CheckResult {
                    name: probe.name().to_string(),
                    status: CheckStatus::Fail,
                    detail: Some("probe timed out".to_string()),
                },
            };
            results.push((probe.critical(), result));
        }

        let mut overall = OverallStatus::Healthy;
        for (critical, result) in &results {
            match (critical, result.status) {
                (true, CheckStatus::Fail) => {
                    overall = OverallStatus::Unhealthy;
                    break;
                }
                (_, CheckStatus::Fail) | (_, CheckStatus::Warn) => {
                    if overall == OverallStatus::Healthy {
                        overall = OverallStatus::Degraded;
                    }
                }
                _ => {}
            }
        }

        (overall, results.into_iter().map(|(_, r)| r).collect())
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Heap usage probe: warns above 80% of a configured budget, fails above 90%.
pub struct HeapUsageProbe {
    pub budget_bytes: u64,
    pub current_bytes_fn: Arc<dyn Fn() -> u64 + Send + Sync>,
}

#[async_trait]
impl HealthProbe for HeapUsageProbe {
    fn name(&self) -> &str {
        "heap_usage"
    }

    fn critical(&self) -> bool {
        true
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(50)
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(15)
    }

    async fn check(&self) -> CheckResult {
        let ratio = (self.current_bytes_fn)() as f64 / self.budget_bytes.max(1) as f64;
        let status = if ratio > 0.9 {
            CheckStatus::Fail
        } else if ratio > 0.8 {
            CheckStatus::Warn
        } else {
            CheckStatus::Ok
        };
        CheckResult {
            name: self.name().to_string(),
            status,
            detail: Some(format!("{:.2}", ratio)),
        }
    }
}

/// Scheduler-tick lag probe: the delay between a scheduled wake and its
/// actual execution. Warns above 50ms, fails above 100ms.
pub struct SchedulerLagProbe {
    pub lag_ms_fn: Arc<dyn Fn() -> u64 + Send + Sync>,
}

#[async_trait]
impl HealthProbe for SchedulerLagProbe {
    fn name(&self) -> &str {
        "scheduler_tick_lag"
    }

    fn critical(&self) -> bool {
        false
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(50)
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn check(&self) -> CheckResult {
        let lag = (self.lag_ms_fn)();
        let status = if lag > 100 {
            CheckStatus::Fail
        } else if lag > 50 {
            CheckStatus::Warn
        } else {
            CheckStatus::Ok
        };
        CheckResult {
            name: self.name().to_string(),
            status,
            detail: Some(format!("{lag}ms")),
        }
    }
}

/// Execution error-rate probe: unresolved/total executions over a rolling
/// window. No warn threshold in spec — any non-zero unresolved ratio above
/// 0 is reported, callers interpret severity from `detail`.
pub struct ErrorRateProbe {
    pub unresolved_and_total_fn: Arc<dyn Fn() -> (u64, u64) + Send + Sync>,
}

#[async_trait]
impl HealthProbe for ErrorRateProbe {
    fn name(&self) -> &str {
        "error_rate"
    }

    fn critical(&self) -> bool {
        false
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(50)
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(30)
    }

    async fn check(&self) -> CheckResult {
        let (unresolved, total) = (self.unresolved_and_total_fn)();
        let rate = if total == 0 { 0.0 } else { unresolved as f64 / total as f64 };
        let status = if rate > 0.1 { CheckStatus::Warn } else { CheckStatus::Ok };
        CheckResult {
            name: self.name().to_string(),
            status,
            detail: Some(format!("{:.3}", rate)),
        }
    }
}

/// Field schema cache hit-rate probe: warns below 0.3.
pub struct CacheHitRateProbe {
    pub hit_rate_fn: Arc<dyn Fn() -> f64 + Send + Sync>,
}

#[async_trait]
impl HealthProbe for CacheHitRateProbe {
    fn name(&self) -> &str {
        "cache_hit_rate"
    }

    fn critical(&self) -> bool {
        false
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(50)
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(30)
    }

    async fn check(&self) -> CheckResult {
        let rate = (self.hit_rate_fn)();
        let status = if rate < 0.3 { CheckStatus::Warn } else { CheckStatus::Ok };
        CheckResult {
            name: self.name().to_string(),
            status,
            detail: Some(format!("{:.2}", rate)),
        }
    }
}

/// Surfaces a collaborator's circuit breaker state as a health signal: an
/// open or half-open breaker degrades the overall status without failing
/// it outright, since a tripped breaker means the engine is still serving
/// requests by fast-failing rather than being down itself.
pub struct CircuitBreakerProbe {
    pub name: String,
    pub state_fn: Arc<dyn Fn() -> CircuitState + Send + Sync>,
}

#[async_trait]
impl HealthProbe for CircuitBreakerProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn critical(&self) -> bool {
        false
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(50)
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(15)
    }

    async fn check(&self) -> CheckResult {
        let state = (self.state_fn)();
        let status = if state.allows_requests() { CheckStatus::Ok } else { CheckStatus::Warn };
        CheckResult {
            name: self.name.clone(),
            status,
            detail: Some(format!("{state:?}")),
        }
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
