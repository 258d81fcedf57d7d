use super::*;

struct FixedProbe {
    name: &'static str,
    critical: bool,
    status: CheckStatus,
}

#[async_trait]
impl HealthProbe for FixedProbe {
    fn name(&self) -> &str {
        self.name
    }

    fn critical(&self) -> bool {
        self.critical
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(50)
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn check(&self) -> CheckResult {
        CheckResult {
            name: self.name.to_string(),
            status: self.status,
            detail: None,
        }
    }
}

#[tokio::test]
async fn all_ok_is_healthy() {
    let monitor = HealthMonitor::new().register(Arc::new(FixedProbe {
        name: "a",
        critical: true,
        status: CheckStatus::Ok,
    }));
    let (status, results) = monitor.run().await;
    assert_eq!(status, OverallStatus::Healthy);
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn critical_failure_is_unhealthy() {
    let monitor = HealthMonitor::new()
        .register(Arc::new(FixedProbe {
            name: "a",
            critical: true,
            status: CheckStatus::Fail,
        }))
        .register(Arc::new(FixedProbe {
            name: "b",
            critical: false,
            status: CheckStatus::Ok,
        }));
    let (status, _) = monitor.run().await;
    assert_eq!(status, OverallStatus::Unhealthy);
}

#[tokio::test]
async fn noncritical_failure_is_degraded_not_unhealthy() {
    let monitor = HealthMonitor::new().register(Arc::new(FixedProbe {
        name: "a",
        critical: false,
        status: CheckStatus::Fail,
    }));
    let (status, _) = monitor.run().await;
    assert_eq!(status, OverallStatus::Degraded);
}

#[tokio::test]
async fn noncritical_warn_is_degraded() {
    let monitor = HealthMonitor::new().register(Arc::new(FixedProbe {
        name: "a",
        critical: false,
        status: CheckStatus::Warn,
    }));
    let (status, _) = monitor.run().await;
    assert_eq!(status, OverallStatus::Degraded);
}

#[tokio::test]
async fn heap_usage_probe_thresholds() {
    let probe = HeapUsageProbe {
        budget_bytes: 100,
        current_bytes_fn: Arc::new(|| 95),
    };
    let result = probe.check().await;
    assert_eq!(result.status, CheckStatus::Fail);

    let probe = HeapUsageProbe {
        budget_bytes: 100,
        current_bytes_fn: Arc::new(|| 85),
    };
    assert_eq!(probe.check().await.status, CheckStatus::Warn);

    let probe = HeapUsageProbe {
        budget_bytes: 100,
        current_bytes_fn: Arc::new(|| 10),
    };
    assert_eq!(probe.check().await.status, CheckStatus::Ok);
}

#[tokio::test]
async fn scheduler_lag_probe_thresholds() {
    let probe = SchedulerLagProbe {
        lag_ms_fn: Arc::new(|| 150),
    };
    assert_eq!(probe.check().await.status, CheckStatus::Fail);

    let probe = SchedulerLagProbe {
        lag_ms_fn: Arc::new(|| 60),
    };
    assert_eq!(probe.check().await.status, CheckStatus::Warn);
}

#[tokio::test]
async fn cache_hit_rate_probe_warns_below_threshold() {
    let probe = CacheHitRateProbe {
        hit_rate_fn: Arc::new(|| 0.1),
    };
    assert_eq!(probe.check().await.status, CheckStatus::Warn);

    let probe = CacheHitRateProbe {
        hit_rate_fn: Arc::new(|| 0.9),
    };
    assert_eq!(probe.check().await.status, CheckStatus::Ok);
}
