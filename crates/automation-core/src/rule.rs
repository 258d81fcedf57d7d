//! Rule, Trigger, Condition, Action value types and the CRUD validator
//! (§3, §4.10 "validation").

use crate::model::{ActionType, Combinator, ConditionType, RuleId, TriggerType};
use crate::FieldError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    pub config: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub config: Value,
    /// `None` only for the first condition in a rule's list.
    pub combinator: Option<Combinator>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub config: Value,
    pub order: i64,
    #[serde(default)]
    pub continue_on_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    #[serde(default)]
    pub project_scope: HashSet<String>,
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub execution_count: u64,
    pub failure_count: u64,
    pub last_executed: Option<DateTime<Utc>>,
}

/// Caller-supplied rule definition, before the engine assigns an id and
/// timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub project_scope: HashSet<String>,
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    pub created_by: String,
}

fn default_enabled() -> bool {
    true
}

/// Patch applied by `update_rule`. `id` is intentionally absent — it is
/// immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulePatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub enabled: Option<bool>,
    pub project_scope: Option<HashSet<String>>,
    pub triggers: Option<Vec<Trigger>>,
    pub conditions: Option<Vec<Condition>>,
    pub actions: Option<Vec<Action>>,
}

impl Rule {
    pub fn from_spec(spec: RuleSpec) -> Self {
        let now = Utc::now();
        Self {
            id: RuleId::new(),
            name: spec.name,
            description: spec.description,
            enabled: spec.enabled,
            project_scope: spec.project_scope,
            triggers: spec.triggers,
            conditions: spec.conditions,
            actions: spec.actions,
            created_at: now,
            updated_at: now,
            created_by: spec.created_by,
            execution_count: 0,
            failure_count: 0,
            last_executed: None,
        }
    }

    /// Whether applying `patch` changes trigger bindings (requires the
    /// engine to tear down and reinstall C9 registrations).
    pub fn patch_changes_bindings(&self, patch: &RulePatch) -> bool {
        patch.enabled.is_some() || patch.triggers.is_some()
    }

    pub fn apply_patch(&mut self, patch: RulePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(project_scope) = patch.project_scope {
            self.project_scope = project_scope;
        }
        if let Some(triggers) = patch.triggers {
            self.triggers = triggers;
        }
        if let Some(conditions) = patch.conditions {
            self.conditions = conditions;
        }
        if let Some(actions) = patch.actions {
            self.actions = actions;
        }
        self.updated_at = Utc::now();
    }

    pub fn success_rate(&self) -> f64 {
        if self.execution_count == 0 {
            return 100.0;
        }
        // Precise form per §9's open-question resolution: (count - failures) / count,
        // not a subtraction of failure-reason bucket counts.
        (self.execution_count - self.failure_count) as f64 / self.execution_count as f64 * 100.0
    }
}

/// Validate a rule specification: non-empty name, >=1 trigger, >=1 action,
/// and per-type config wellformedness. Returns machine-readable field
/// errors with codes so callers can render them (spec §4.10).
pub fn validate_spec(spec: &RuleSpec) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if spec.name.trim().is_empty() {
        errors.push(FieldError::new("name", "required", "name must not be empty"));
    }
    if spec.triggers.is_empty() {
        errors.push(FieldError::new(
            "triggers",
            "min_length",
            "at least one trigger is required",
        ));
    }
    if spec.actions.is_empty() {
        errors.push(FieldError::new(
            "actions",
            "min_length",
            "at least one action is required",
        ));
    }

    for (i, trigger) in spec.triggers.iter().enumerate() {
        if let Err(e) = validate_trigger(trigger) {
            errors.push(FieldError::new(
                format!("triggers[{i}]"),
                "invalid_config",
                e,
            ));
        }
    }

    for (i, condition) in spec.conditions.iter().enumerate() {
        if i == 0 && condition.combinator.is_some() {
            errors.push(FieldError::new(
                format!("conditions[{i}].combinator"),
                "unexpected",
                "the first condition must not declare a combinator",
            ));
        }
        if i > 0 && condition.combinator.is_none() {
            errors.push(FieldError::new(
                format!("conditions[{i}].combinator"),
                "required",
                "every condition after the first requires a combinator",
            ));
        }
        if condition.condition_type == ConditionType::CustomScript {
            errors.push(FieldError::new(
                format!("conditions[{i}].type"),
                "not_implemented",
                "CUSTOM_SCRIPT conditions must not evaluate host code; deny by default",
            ));
        }
    }

    let mut seen_orders = HashSet::new();
    for (i, action) in spec.actions.iter().enumerate() {
        if !seen_orders.insert(action.order) {
            errors.push(FieldError::new(
                format!("actions[{i}].order"),
                "duplicate",
                "action order values must be unique within a rule",
            ));
        }
        if let Err(e) = validate_action_config(action) {
            errors.push(FieldError::new(
                format!("actions[{i}].config"),
                "invalid_config",
                e,
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_trigger(trigger: &Trigger) -> Result<(), String> {
    match trigger.trigger_type {
        TriggerType::Scheduled => {
            require_str(&trigger.config, "cron_expression")?;
            require_str(&trigger.config, "timezone")?;
        }
        TriggerType::Webhook => {
            require_str(&trigger.config, "inlet_id")?;
        }
        TriggerType::FieldChanged => {
            require_str(&trigger.config, "field_id")?;
        }
        _ => {}
    }
    Ok(())
}

fn validate_action_config(action: &Action) -> Result<(), String> {
    match action.action_type {
        ActionType::UpdateIssue | ActionType::UpdateCustomField => {
            require_object(&action.config, "fields")?;
        }
        ActionType::TransitionIssue => {
            if action.config.get("transition_id").is_none()
                && action.config.get("transition_name").is_none()
            {
                return Err("requires transition_id or transition_name".into());
            }
        }
        ActionType::CreateIssue => {
            require_str(&action.config, "project_key")?;
            require_str(&action.config, "issue_type")?;
            require_str(&action.config, "summary")?;
        }
        ActionType::AddComment => {
            let body = action
                .config
                .get("body")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if body.is_empty() {
                return Err("requires a non-empty body".into());
            }
        }
        ActionType::SendNotification => {
            let recipients = action
                .config
                .get("recipients")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0);
            if recipients == 0 {
                return Err("requires at least one recipient".into());
            }
        }
        ActionType::WebhookCall => {
            require_str(&action.config, "url")?;
        }
        ActionType::BulkOperation => {
            require_str(&action.config, "jql")?;
        }
        ActionType::LinkIssues => {
            require_str(&action.config, "target_issue_key")?;
        }
        ActionType::AssignIssue | ActionType::CreateSubtask => {}
    }
    Ok(())
}

fn require_str(config: &Value, field: &str) -> Result<(), String> {
    match config.get(field).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(()),
        _ => Err(format!("{field} is required")),
    }
}

fn require_object(config: &Value, field: &str) -> Result<(), String> {
    match config.get(field).and_then(Value::as_object) {
        Some(m) if !m.is_empty() => Ok(()),
        _ => Err(format!("{field} is required and must be non-empty")),
    }
}

#[cfg(test)]
#[path = "rule_tests.rs"]
mod tests;
