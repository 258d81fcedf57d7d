//! Per-rule metrics maintained by the Engine's execution pipeline (§4.10
//! step 5): execution/failure counts live on `Rule` itself; the moving
//! average duration, last-execution timestamp, and failure-reason buckets
//! live here since they have no place in the persisted rule record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleMetrics {
    pub execution_count: u64,
    pub failure_count: u64,
    pub average_duration_ms: f64,
    pub last_execution: Option<DateTime<Utc>>,
    pub failure_reasons: HashMap<String, u64>,
}

impl RuleMetrics {
    pub fn success_rate(&self) -> f64 {
        if self.execution_count == 0 {
            return 100.0;
        }
        (self.execution_count - self.failure_count) as f64 / self.execution_count as f64 * 100.0
    }

    /// Fold in one more execution's outcome: bump counts, recompute the
    /// running average duration, and bucket the failure reason if any.
    pub fn record(&mut self, duration_ms: u64, failure_reason: Option<&str>) {
        self.execution_count += 1;
        self.last_execution = Some(Utc::now());
        self.average_duration_ms +=
            (duration_ms as f64 - self.average_duration_ms) / self.execution_count as f64;
        if let Some(reason) = failure_reason {
            self.failure_count += 1;
            *self.failure_reasons.entry(reason.to_string()).or_insert(0) += 1;
        }
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
