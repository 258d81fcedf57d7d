//! Execution, ActionResult, and ExecutionContext (§3).

use crate::model::{ActionResultStatus, ActionType, ExecutionId, ExecutionStatus, RuleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Tagged context record (REDESIGN FLAGS: replaces duck-typed context bags).
/// Well-known slots plus a `custom` map for smart-value lookups that don't
/// fit the named slots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub issue_key: Option<String>,
    pub project_key: Option<String>,
    pub user_id: Option<String>,
    pub webhook_payload: Option<Value>,
    pub trigger_payload: Option<Value>,
    #[serde(default)]
    pub custom: HashMap<String, Value>,
    /// Full issue payload as fetched/pushed, used by `FIELD_VALUE` and the
    /// smart-value resolver's `issue.*` paths.
    pub issue_payload: Option<Value>,
    /// Rule this context's execution belongs to, stamped by the Engine
    /// before actions run. Lets action adapters (e.g. `bulk-operation`)
    /// attribute records they own back to the owning rule.
    pub rule_id: Option<RuleId>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issue_key(mut self, key: impl Into<String>) -> Self {
        self.issue_key = Some(key.into());
        self
    }

    pub fn with_project_key(mut self, key: impl Into<String>) -> Self {
        self.project_key = Some(key.into());
        self
    }

    pub fn with_rule_id(mut self, rule_id: RuleId) -> Self {
        self.rule_id = Some(rule_id);
        self
    }

    /// Resolve a dotted path against the tagged slots: `issue.*` looks into
    /// `issue_payload`, `webhook.*` into `webhook_payload`, `trigger.*` into
    /// `trigger_payload`, anything else into `custom`, falling back to the
    /// top-level well-known scalar slots (`issue_key`, `project_key`,
    /// `user_id`) when the first segment names one of them directly.
    pub fn resolve_path(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let root = segments.next()?;
        let rest: Vec<&str> = segments.collect();

        let base: Value = match root {
            "issue" => self.issue_payload.clone()?,
            "webhook" => self.webhook_payload.clone()?,
            "trigger" => self.trigger_payload.clone()?,
            "issue_key" if rest.is_empty() => return self.issue_key.clone().map(Value::String),
            "project_key" if rest.is_empty() => return self.project_key.clone().map(Value::String),
            "user_id" if rest.is_empty() => return self.user_id.clone().map(Value::String),
            other => self.custom.get(other).cloned()?,
        };

        let mut current = base;
        for segment in rest {
            current = match current {
                Value::Object(ref map) => map.get(segment)?.clone(),
                _ => return None,
            };
        }
        Some(current)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_type: ActionType,
    pub status: ActionResultStatus,
    pub message: Option<String>,
    pub data: Option<Value>,
    pub duration_ms: u64,
}

impl ActionResult {
    pub fn success(action_type: ActionType, data: Option<Value>, duration_ms: u64) -> Self {
        Self {
            action_type,
            status: ActionResultStatus::Success,
            message: None,
            data,
            duration_ms,
        }
    }

    pub fn failed(action_type: ActionType, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            action_type,
            status: ActionResultStatus::Failed,
            message: Some(message.into()),
            data: None,
            duration_ms,
        }
    }

    /// A failed result that still carries adapter-supplied data, e.g. a
    /// `bulk-operation` that ran to completion but had `failed > 0` (spec
    /// §4.10: "the bulk action's ActionResult carries both counts").
    pub fn failed_with_data(action_type: ActionType, message: impl Into<String>, data: Value, duration_ms: u64) -> Self {
        Self {
            action_type,
            status: ActionResultStatus::Failed,
            message: Some(message.into()),
            data: Some(data),
            duration_ms,
        }
    }

    pub fn skipped(action_type: ActionType, message: impl Into<String>) -> Self {
        Self {
            action_type,
            status: ActionResultStatus::Skipped,
            message: Some(message.into()),
            data: None,
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub rule_id: RuleId,
    pub triggered_at: DateTime<Utc>,
    pub triggered_by: String,
    pub status: ExecutionStatus,
    pub context: ExecutionContext,
    pub results: Vec<ActionResult>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
}

impl Execution {
    pub fn new(rule_id: RuleId, triggered_by: impl Into<String>, context: ExecutionContext) -> Self {
        Self {
            id: ExecutionId::new(),
            rule_id,
            triggered_at: Utc::now(),
            triggered_by: triggered_by.into(),
            status: ExecutionStatus::Running,
            context,
            results: Vec::new(),
            error: None,
            duration_ms: None,
        }
    }
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
