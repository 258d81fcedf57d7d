//! BulkOperationProgress data model and the store trait the `bulk-operation`
//! action adapter reports into (§3, §4.10 "Bulk operation"). The progress
//! records themselves remain exclusively Engine-owned (§3 "Ownership"); this
//! trait is the seam the action executor uses to update them without
//! depending on the Engine type directly.

use crate::model::{BulkOperationId, BulkStatus, RuleId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_ERRORS: usize = 100;

/// Smoothing factor for the per-item duration EMA. Weighted toward the most
/// recent batch so the ETA reacts to a tracker slowdown within a few
/// batches instead of being dragged down by the whole run's history.
const ETA_SMOOTHING_ALPHA: f64 = 0.3;

/// Outcome of processing a single item within a batch, reported to
/// [`BulkOperationProgress::record_batch`] once per page rather than once
/// per item (spec §4.10 "after each batch, update processed, succeeded,
/// failed, and an EMA estimated_completion").
#[derive(Debug, Clone)]
pub enum BulkItemOutcome {
    Success,
    Failure { item_key: String, error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemError {
    pub item_key: String,
    pub error: String,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOperationProgress {
    pub id: BulkOperationId,
    pub rule_id: RuleId,
    pub total: u64,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub status: BulkStatus,
    pub started_at: DateTime<Utc>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub errors: Vec<BulkItemError>,
    /// Exponential moving average of per-item processing time, in
    /// milliseconds. `None` until the first batch reports a duration.
    #[serde(skip)]
    avg_item_ms: Option<f64>,
}

impl BulkOperationProgress {
    pub fn new(rule_id: RuleId, total: u64) -> Self {
        Self {
            id: BulkOperationId::new(),
            rule_id,
            total,
            processed: 0,
            succeeded: 0,
            failed: 0,
            status: BulkStatus::Running,
            started_at: Utc::now(),
            estimated_completion: None,
            errors: Vec::new(),
            avg_item_ms: None,
        }
    }

    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
        self.refresh_eta();
    }

    /// Append an error, capping the bounded list at `MAX_ERRORS` by
    /// dropping the oldest entry on overflow (spec §4.10).
    pub fn record_failure(&mut self, item_key: impl Into<String>, error: impl Into<String>) {
        self.processed += 1;
        self.failed += 1;
        if self.errors.len() >= MAX_ERRORS {
            self.errors.remove(0);
        }
        self.errors.push(BulkItemError {
            item_key: item_key.into(),
            error: error.into(),
            ts: Utc::now(),
        });
        self.refresh_eta();
    }

    /// Apply one batch's worth of outcomes in a single update, folding the
    /// batch's measured wall-clock duration into the per-item EMA that
    /// drives `estimated_completion`. Called once per page by the
    /// bulk-operation action adapter rather than once per item.
    pub fn record_batch(&mut self, outcomes: Vec<BulkItemOutcome>, batch_duration: Duration) {
        if outcomes.is_empty() {
            return;
        }
        let item_count = outcomes.len();
        for outcome in outcomes {
            match outcome {
                BulkItemOutcome::Success => {
                    self.processed += 1;
                    self.succeeded += 1;
                }
                BulkItemOutcome::Failure { item_key, error } => {
                    self.processed += 1;
                    self.failed += 1;
                    if self.errors.len() >= MAX_ERRORS {
                        self.errors.remove(0);
                    }
                    self.errors.push(BulkItemError { item_key, error, ts: Utc::now() });
                }
            }
        }

        let observed_ms = batch_duration.as_secs_f64() * 1000.0 / item_count as f64;
        self.avg_item_ms = Some(match self.avg_item_ms {
            Some(prev) => ETA_SMOOTHING_ALPHA * observed_ms + (1.0 - ETA_SMOOTHING_ALPHA) * prev,
            None => observed_ms,
        });
        self.refresh_eta();
    }

    fn refresh_eta(&mut self) {
        let Some(avg_item_ms) = self.avg_item_ms else {
            return;
        };
        if self.total == 0 {
            return;
        }
        let remaining = self.total.saturating_sub(self.processed) as f64;
        let remaining_ms = (avg_item_ms * remaining).round() as i64;
        self.estimated_completion = Some(Utc::now() + chrono::Duration::milliseconds(remaining_ms));
    }

    pub fn finish(&mut self) {
        self.status = if self.failed == 0 {
            BulkStatus::Completed
        } else {
            BulkStatus::Failed
        };
        self.estimated_completion = None;
    }
}

/// Seam between the Engine (sole owner of bulk progress records) and the
/// `bulk-operation` action adapter, which needs to create and update them
/// without owning the Engine's registry lock itself.
#[async_trait]
pub trait BulkProgressStore: Send + Sync {
    async fn create(&self, rule_id: RuleId, total: u64) -> BulkOperationId;
    async fn update(&self, id: BulkOperationId, f: Box<dyn FnOnce(&mut BulkOperationProgress) + Send>);
    async fn get(&self, id: BulkOperationId) -> Option<BulkOperationProgress>;
}

#[cfg(test)]
#[path = "bulk_tests.rs"]
mod tests;
