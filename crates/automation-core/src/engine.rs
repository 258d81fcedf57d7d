//! Automation Engine (C10, spec §4.10): rule registry, execution pipeline,
//! metrics, bulk-operation progress ownership, retention sweep, and
//! graceful shutdown.

use crate::action::{default_registry, execute_action, ActionAdapterRegistry};
use crate::audit::{AuditSink, EventKind, Outcome};
use crate::bulk::{BulkOperationProgress, BulkProgressStore};
use crate::condition;
use crate::error::{AutomationError, FieldError};
use crate::execution::{ActionResult, Execution, ExecutionContext};
use crate::metrics::RuleMetrics;
use crate::model::{ActionResultStatus, BulkOperationId, ExecutionStatus, PrincipalId, RuleId};
use crate::rule::{validate_spec, Action, Rule, RulePatch, RuleSpec};
use crate::trigger::{Fire, TriggerManager};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, RwLock, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use tracker_client::TrackerClient;

#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    pub project_key: Option<String>,
    pub enabled_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    pub rule_id: Option<RuleId>,
    pub status: Option<ExecutionStatus>,
}

pub struct EngineConfig {
    pub max_concurrent_executions: usize,
    pub fire_queue_capacity: usize,
    pub retention_days: i64,
    /// Recipients the `send-notification` adapter is invoked with on a
    /// FAILED execution (spec §4.10 step 5: "trigger failure notification
    /// via the notification adapter"). Empty disables the notification.
    pub failure_recipients: Vec<String>,
    /// Wall-clock budget for a single rule's action pipeline (§6
    /// `EXECUTION_TIMEOUT_MS`). An execution that exceeds this is marked
    /// `Failed` with a timeout reason rather than left running.
    pub execution_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: 10,
            fire_queue_capacity: 256,
            retention_days: 30,
            failure_recipients: Vec::new(),
            execution_timeout: Duration::from_millis(300_000),
        }
    }
}

/// Shares the bulk-progress map between the Engine (sole owner, per spec
/// §3 "Ownership") and the `bulk-operation` action adapter, which only
/// needs the narrow `BulkProgressStore` seam.
struct SharedBulkStore(Arc<RwLock<HashMap<BulkOperationId, BulkOperationProgress>>>);

#[async_trait::async_trait]
impl BulkProgressStore for SharedBulkStore {
    async fn create(&self, rule_id: RuleId, total: u64) -> BulkOperationId {
        let progress = BulkOperationProgress::new(rule_id, total);
        let id = progress.id;
        self.0.write().await.insert(id, progress);
        id
    }

    async fn update(&self, id: BulkOperationId, f: Box<dyn FnOnce(&mut BulkOperationProgress) + Send>) {
        if let Some(progress) = self.0.write().await.get_mut(&id) {
            f(progress);
        }
    }

    async fn get(&self, id: BulkOperationId) -> Option<BulkOperationProgress> {
        self.0.read().await.get(&id).cloned()
    }
}

pub struct Engine {
    rules: RwLock<HashMap<RuleId, Rule>>,
    metrics: RwLock<HashMap<RuleId, RuleMetrics>>,
    executions: RwLock<Vec<Execution>>,
    bulk_progress: Arc<RwLock<HashMap<BulkOperationId, BulkOperationProgress>>>,
    client: Arc<TrackerClient>,
    action_registry: ActionAdapterRegistry,
    trigger_manager: Arc<TriggerManager>,
    fire_rx: Mutex<Option<mpsc::Receiver<Fire>>>,
    semaphore: Arc<Semaphore>,
    audit: Option<Arc<AuditSink>>,
    config: EngineConfig,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

impl Engine {
    pub fn new(client: Arc<TrackerClient>, config: EngineConfig) -> Arc<Self> {
        Self::with_audit(client, config, None)
    }

    pub fn with_audit(client: Arc<TrackerClient>, config: EngineConfig, audit: Option<Arc<AuditSink>>) -> Arc<Self> {
        let bulk_progress = Arc::new(RwLock::new(HashMap::new()));
        let action_registry = default_registry(client.clone(), Arc::new(SharedBulkStore(bulk_progress.clone())));
        let (fire_tx, fire_rx) = mpsc::channel(config.fire_queue_capacity);
        let mut trigger_manager = TriggerManager::new(fire_tx);
        if let Some(sink) = &audit {
            trigger_manager = trigger_manager.with_audit(sink.clone());
        }
        Arc::new(Self {
            rules: RwLock::new(HashMap::new()),
            metrics: RwLock::new(HashMap::new()),
            executions: RwLock::new(Vec::new()),
            bulk_progress,
            client,
            action_registry,
            trigger_manager: Arc::new(trigger_manager),
            fire_rx: Mutex::new(Some(fire_rx)),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_executions)),
            audit,
            config,
            worker: Mutex::new(None),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Returns an error for every mutation once `shutdown()` has run (spec
    /// §8 invariant 4: "calling any mutation returns an error").
    fn ensure_running(&self) -> Result<(), AutomationError> {
        if self.shutdown.load(Ordering::SeqCst) {
            Err(AutomationError::Execution {
                message: "engine is shut down".to_string(),
            })
        } else {
            Ok(())
        }
    }

    pub fn trigger_manager(&self) -> Arc<TriggerManager> {
        self.trigger_manager.clone()
    }

    /// Start the worker loop draining the fire-queue. Each fire acquires a
    /// semaphore permit before its pipeline runs, bounding concurrent
    /// executions to `max_concurrent_executions` (spec §5).
    pub async fn start(self: &Arc<Self>) {
        let Some(mut rx) = self.fire_rx.lock().await.take() else {
            return;
        };
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(fire) = rx.recv().await {
                let engine = engine.clone();
                let permit = engine.semaphore.clone().acquire_owned().await;
                tokio::spawn(async move {
                    let _permit = permit;
                    engine.run_fire(fire).await;
                });
            }
        });
        *self.worker.lock().await = Some(handle);
    }

    async fn run_fire(self: &Arc<Self>, fire: Fire) {
        let rule = self.rules.read().await.get(&fire.rule_id).cloned();
        let Some(rule) = rule else {
            return;
        };
        if !rule.enabled {
            return;
        }
        self.run_pipeline(rule, fire.context, &fire.triggered_by).await;
    }

    // ------------------------------------------------------------------
    // CRUD
    // ------------------------------------------------------------------

    #[instrument(skip(self, spec))]
    pub async fn create_rule(&self, spec: RuleSpec) -> Result<Rule, AutomationError> {
        self.ensure_running()?;
        validate_spec(&spec).map_err(AutomationError::validation)?;
        let rule = Rule::from_spec(spec);
        if rule.enabled {
            self.trigger_manager.bind_rule(rule.id, &rule.triggers).await;
        }
        self.rules.write().await.insert(rule.id, rule.clone());
        self.metrics.write().await.insert(rule.id, RuleMetrics::default());
        self.audit_event(
            EventKind::ConfigurationChange,
            "rule.created",
            "create_rule",
            Some(rule.id.to_string()),
            Outcome::Success,
        )
        .await;
        Ok(rule)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_rule(&self, id: RuleId, patch: RulePatch) -> Result<Rule, AutomationError> {
        self.ensure_running()?;
        let mut rules = self.rules.write().await;
        let existing = rules
            .get(&id)
            .ok_or_else(|| AutomationError::not_found("rule", id.to_string()))?;

        let rebind = existing.patch_changes_bindings(&patch);
        let mut candidate = existing.clone();
        candidate.apply_patch(patch);

        let spec_check = RuleSpec {
            name: candidate.name.clone(),
            description: candidate.description.clone(),
            enabled: candidate.enabled,
            project_scope: candidate.project_scope.clone(),
            triggers: candidate.triggers.clone(),
            conditions: candidate.conditions.clone(),
            actions: candidate.actions.clone(),
            created_by: candidate.created_by.clone(),
        };
        validate_spec(&spec_check).map_err(AutomationError::validation)?;

        let updated = candidate;
        rules.insert(id, updated.clone());
        drop(rules);

        if rebind {
            self.trigger_manager.unbind_rule(id).await;
            if updated.enabled {
                self.trigger_manager.bind_rule(id, &updated.triggers).await;
            }
        }
        self.audit_event(
            EventKind::ConfigurationChange,
            "rule.updated",
            "update_rule",
            Some(id.to_string()),
            Outcome::Success,
        )
        .await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_rule(&self, id: RuleId) -> Result<(), AutomationError> {
        self.ensure_running()?;
        {
            let mut rules = self.rules.write().await;
            rules
                .remove(&id)
                .ok_or_else(|| AutomationError::not_found("rule", id.to_string()))?;
        }
        self.trigger_manager.unbind_rule(id).await;

        let mut executions = self.executions.write().await;
        for execution in executions.iter_mut() {
            if execution.rule_id == id && !execution.status.is_terminal() {
                execution.status = ExecutionStatus::Cancelled;
            }
        }
        self.audit_event(
            EventKind::ConfigurationChange,
            "rule.deleted",
            "delete_rule",
            Some(id.to_string()),
            Outcome::Success,
        )
        .await;
        Ok(())
    }

    pub async fn get_rule(&self, id: RuleId) -> Option<Rule> {
        self.rules.read().await.get(&id).cloned()
    }

    pub async fn get_rules(&self, filter: RuleFilter) -> Vec<Rule> {
        self.rules
            .read()
            .await
            .values()
            .filter(|r| !filter.enabled_only || r.enabled)
            .filter(|r| match &filter.project_key {
                Some(key) => r.project_scope.is_empty() || r.project_scope.contains(key),
                None => true,
            })
            .cloned()
            .collect()
    }

    pub fn validate_rule(&self, spec: &RuleSpec) -> Result<(), Vec<FieldError>> {
        validate_spec(spec)
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    #[instrument(skip(self, ctx))]
    pub async fn execute_rule(self: &Arc<Self>, id: RuleId, ctx: ExecutionContext) -> Result<Execution, AutomationError> {
        self.ensure_running()?;
        let rule = self
            .rules
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AutomationError::not_found("rule", id.to_string()))?;
        if !rule.enabled {
            return Err(AutomationError::Execution {
                message: "rule is disabled".to_string(),
            });
        }
        let _permit = self.semaphore.acquire().await;
        Ok(self.run_pipeline(rule, ctx, "manual").await)
    }

    async fn run_pipeline(self: &Arc<Self>, rule: Rule, ctx: ExecutionContext, triggered_by: &str) -> Execution {
        let start = Instant::now();
        let ctx = ctx.with_rule_id(rule.id);
        let mut execution = Execution::new(rule.id, triggered_by, ctx.clone());
        let execution_id = execution.id;
        self.executions.write().await.push(execution.clone());
        info!(rule_id = %rule.id, execution_id = %execution_id, "execution_started");

        let mut actions: Vec<&Action> = rule.actions.iter().collect();
        actions.sort_by_key(|a| a.order);

        let resolved: Vec<serde_json::Value> = actions
            .iter()
            .map(|a| crate::smart_value::resolve_config(&a.config, &ctx))
            .collect();

        let conditions_matched = match condition::evaluate_all(&rule.conditions, &ctx, &self.client).await {
            Ok(matched) => matched,
            Err(e) => {
                warn!(rule_id = %rule.id, error = %e, "condition evaluation failed, treating as not matched");
                false
            }
        };

        let mut failure_reason = None;
        if !conditions_matched {
            execution.results.push(ActionResult::skipped(
                actions.first().map(|a| a.action_type).unwrap_or(crate::model::ActionType::UpdateIssue),
                "conditions not met",
            ));
            execution.status = ExecutionStatus::Completed;
        } else {
            // The timeout budgets the whole pipeline but is applied to each
            // action individually: on expiry the in-flight action is
            // dropped and no further action starts, but every action that
            // already completed keeps its result (spec §5 "in-flight
            // action completes, remaining actions not started").
            let deadline = Instant::now() + self.config.execution_timeout;
            let mut timed_out = false;
            for (action, config) in actions.iter().copied().zip(resolved.iter()) {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    timed_out = true;
                    break;
                }
                match tokio::time::timeout(remaining, execute_action(&self.action_registry, action, config, &ctx)).await {
                    Ok(result) => {
                        let failed = result.status == ActionResultStatus::Failed;
                        let continue_on_error = action.continue_on_error;
                        let message = result.message.clone();
                        execution.results.push(result);
                        if failed && !continue_on_error {
                            failure_reason = Some(message.clone().unwrap_or_default());
                            execution.status = ExecutionStatus::Failed;
                            execution.error = message;
                            break;
                        }
                    }
                    Err(_) => {
                        timed_out = true;
                        break;
                    }
                }
            }

            if timed_out {
                let message = "execution timed out".to_string();
                failure_reason = Some(message.clone());
                execution.status = ExecutionStatus::Failed;
                execution.error = Some(message);
            } else if failure_reason.is_none() {
                execution.status = ExecutionStatus::Completed;
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        execution.duration_ms = Some(duration_ms);

        {
            let mut metrics = self.metrics.write().await;
            metrics
                .entry(rule.id)
                .or_default()
                .record(duration_ms, failure_reason.as_deref());
        }
        {
            let mut rules = self.rules.write().await;
            if let Some(stored) = rules.get_mut(&rule.id) {
                stored.execution_count += 1;
                stored.last_executed = Some(chrono::Utc::now());
                if failure_reason.is_some() {
                    stored.failure_count += 1;
                }
            }
        }

        if let Some(reason) = &failure_reason {
            self.notify_failure(&rule, reason).await;
            error!(rule_id = %rule.id, execution_id = %execution_id, reason, "execution_failed");
        } else {
            info!(rule_id = %rule.id, execution_id = %execution_id, "execution_completed");
        }

        self.audit_event(
            if failure_reason.is_some() {
                EventKind::Error
            } else {
                EventKind::ToolExecution
            },
            "rule.executed",
            "execute_rule",
            Some(rule.id.to_string()),
            if failure_reason.is_some() { Outcome::Failure } else { Outcome::Success },
        )
        .await;

        {
            let mut executions = self.executions.write().await;
            if let Some(stored) = executions.iter_mut().find(|e| e.id == execution_id) {
                *stored = execution.clone();
            }
        }

        execution
    }

    async fn notify_failure(&self, rule: &Rule, reason: &str) {
        if self.config.failure_recipients.is_empty() {
            return;
        }
        let Some(adapter) = self.action_registry.get(crate::model::ActionType::SendNotification) else {
            return;
        };
        let config = serde_json::json!({
            "recipients": self.config.failure_recipients,
            "channel": "email",
            "reason": reason,
            "rule_id": rule.id.to_string(),
        });
        let _ = adapter.execute(&config, &ExecutionContext::new()).await;
    }

    pub async fn get_executions(&self, filter: ExecutionFilter, limit: Option<usize>) -> Vec<Execution> {
        let mut executions: Vec<Execution> = self
            .executions
            .read()
            .await
            .iter()
            .filter(|e| filter.rule_id.map(|id| id == e.rule_id).unwrap_or(true))
            .filter(|e| filter.status.map(|s| s == e.status).unwrap_or(true))
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        if let Some(limit) = limit {
            executions.truncate(limit);
        }
        executions
    }

    pub async fn get_metrics(&self, rule_id: Option<RuleId>) -> HashMap<RuleId, RuleMetrics> {
        let metrics = self.metrics.read().await;
        match rule_id {
            Some(id) => metrics
                .get(&id)
                .map(|m| HashMap::from([(id, m.clone())]))
                .unwrap_or_default(),
            None => metrics.clone(),
        }
    }

    pub async fn get_bulk_progress(&self, id: BulkOperationId) -> Option<BulkOperationProgress> {
        self.bulk_progress.read().await.get(&id).cloned()
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Retention sweep: drop executions and bulk progress records older
    /// than `retention_days` (spec §4.10).
    pub async fn cleanup(&self) {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(self.config.retention_days);
        self.executions.write().await.retain(|e| e.triggered_at >= cutoff);
        self.bulk_progress.write().await.retain(|_, p| p.started_at >= cutoff);
    }

    /// Stop all timers, mark in-flight executions CANCELLED, release
    /// webhook resources. Idempotent.
    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.trigger_manager.shutdown().await;
        if let Some(handle) = self.worker.lock().await.take() {
            handle.abort();
        }
        let mut executions = self.executions.write().await;
        for execution in executions.iter_mut() {
            if !execution.status.is_terminal() {
                execution.status = ExecutionStatus::Cancelled;
            }
        }
    }

    async fn audit_event(&self, kind: EventKind, event_type: &str, action: &str, resource: Option<String>, outcome: Outcome) {
        if let Some(audit) = &self.audit {
            let _ = audit
                .record(
                    kind,
                    event_type,
                    None::<&PrincipalId>,
                    action,
                    resource,
                    outcome,
                    serde_json::json!({}),
                    None,
                )
                .await;
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
