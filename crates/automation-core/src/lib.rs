//! Rule automation runtime: triggers, conditions, action pipelines, webhook
//! dispatch, and the audit/permission/rate-limit gating that wraps every
//! public operation.
//!
//! `engine::Engine` is the composition root — it owns the rule registry,
//! the execution pipeline, and bulk-operation progress; every other module
//! in this crate is a collaborator it wires together at startup.

pub mod action;
pub mod audit;
pub mod bulk;
pub mod condition;
pub mod engine;
pub mod error;
pub mod execution;
pub mod field_schema;
pub mod health;
pub mod metrics;
pub mod model;
pub mod permission;
pub mod rate_limit;
pub mod rule;
pub mod smart_value;
pub mod trigger;
pub mod webhook;

pub use action::{ActionAdapter, ActionAdapterRegistry, ActionError};
pub use audit::{AuditRecord, AuditSink, EventKind, Outcome, Severity};
pub use bulk::{BulkItemError, BulkItemOutcome, BulkOperationProgress, BulkProgressStore};
pub use engine::{Engine, EngineConfig, ExecutionFilter, RuleFilter};
pub use error::{AutomationError, ErrorCategory, FieldError};
pub use execution::{ActionResult, Execution, ExecutionContext};
pub use field_schema::{FieldSchemaCache, FieldSchemaError};
pub use health::{
    CacheHitRateProbe, CheckResult, CheckStatus, CircuitBreakerProbe, ErrorRateProbe, HealthMonitor, HealthProbe,
    HeapUsageProbe, OverallStatus, SchedulerLagProbe,
};
pub use metrics::RuleMetrics;
pub use model::{
    ActionResultStatus, ActionType, BulkOperationId, BulkStatus, Combinator, Comparator, ConditionType,
    ExecutionId, ExecutionStatus, IntegrationId, PrincipalId, RuleId, TriggerType,
};
pub use permission::{DefaultPolicy, PermissionDecision, PermissionGate, PrincipalPolicy};
pub use rate_limit::{PrincipalLimit, RateLimitDecision, RateLimiter};
pub use rule::{validate_spec, Action, Condition, Rule, RulePatch, RuleSpec, Trigger};
pub use trigger::{Fire, TriggerManager};
pub use webhook::{WebhookDispatchError, WebhookDispatcher, WebhookIntegration, WebhookIntegrationSpec};
