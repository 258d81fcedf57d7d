//! Event subscription subsystem: matches a pushed issue-level event against
//! a rule's trigger configs and sub-filters (spec §4.9 "Event
//! subscriptions").

use crate::execution::ExecutionContext;
use crate::model::TriggerType;
use crate::rule::Trigger;
use serde_json::Value;

/// A pushed event `{kind, issue_payload}`, optionally carrying the extra
/// fields transition/field-changed sub-filters compare against.
#[derive(Debug, Clone)]
pub struct IssueEvent {
    pub kind: IssueEventKind,
    pub issue_payload: Value,
    pub project_key: Option<String>,
    pub issue_type: Option<String>,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub field_id: Option<String>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl IssueEvent {
    pub fn new(kind: IssueEventKind, issue_payload: Value) -> Self {
        let project_key = issue_payload
            .get("fields")
            .and_then(|f| f.get("project"))
            .and_then(|p| p.get("key"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let issue_type = issue_payload
            .get("fields")
            .and_then(|f| f.get("issuetype"))
            .and_then(|t| t.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            kind,
            issue_payload,
            project_key,
            issue_type,
            from_status: None,
            to_status: None,
            field_id: None,
            old_value: None,
            new_value: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueEventKind {
    IssueCreated,
    IssueUpdated,
    IssueTransitioned,
    IssueCommented,
    FieldChanged,
}

impl IssueEventKind {
    fn matches_trigger_type(self, trigger_type: TriggerType) -> bool {
        matches!(
            (self, trigger_type),
            (Self::IssueCreated, TriggerType::IssueCreated)
                | (Self::IssueUpdated, TriggerType::IssueUpdated)
                | (Self::IssueTransitioned, TriggerType::IssueTransitioned)
                | (Self::IssueCommented, TriggerType::IssueCommented)
                | (Self::FieldChanged, TriggerType::FieldChanged)
        )
    }
}

#[derive(Debug, Clone)]
pub struct EventSubscription {
    trigger_type: TriggerType,
    project_keys: Vec<String>,
    issue_types: Vec<String>,
    from_status: Option<String>,
    to_status: Option<String>,
    field_id: Option<String>,
}

impl EventSubscription {
    pub fn matches(&self, event: &IssueEvent) -> bool {
        if !event.kind.matches_trigger_type(self.trigger_type) {
            return false;
        }
        if !self.project_keys.is_empty() {
            if !event
                .project_key
                .as_deref()
                .is_some_and(|pk| self.project_keys.iter().any(|p| p == pk))
            {
                return false;
            }
        }
        if !self.issue_types.is_empty() {
            if !event
                .issue_type
                .as_deref()
                .is_some_and(|it| self.issue_types.iter().any(|t| t == it))
            {
                return false;
            }
        }
        if let Some(from) = &self.from_status {
            if event.from_status.as_deref() != Some(from.as_str()) {
                return false;
            }
        }
        if let Some(to) = &self.to_status {
            if event.to_status.as_deref() != Some(to.as_str()) {
                return false;
            }
        }
        if let Some(field_id) = &self.field_id {
            if event.field_id.as_deref() != Some(field_id.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Build the event subscription for a trigger, if it is one of the
/// event-driven trigger types.
pub fn subscription_for(trigger: &Trigger) -> Option<EventSubscription> {
    if !matches!(
        trigger.trigger_type,
        TriggerType::IssueCreated
            | TriggerType::IssueUpdated
            | TriggerType::IssueTransitioned
            | TriggerType::IssueCommented
            | TriggerType::FieldChanged
    ) {
        return None;
    }

    let str_list = |key: &str| -> Vec<String> {
        trigger
            .config
            .get(key)
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    };
    let str_opt = |key: &str| -> Option<String> {
        trigger.config.get(key).and_then(Value::as_str).map(str::to_string)
    };

    Some(EventSubscription {
        trigger_type: trigger.trigger_type,
        project_keys: str_list("project_keys"),
        issue_types: str_list("issue_types"),
        from_status: str_opt("from_status"),
        to_status: str_opt("to_status"),
        field_id: str_opt("field_id"),
    })
}

/// Build the execution context a matched event fires with.
pub fn context_for(event: &IssueEvent) -> ExecutionContext {
    let mut ctx = ExecutionContext::new();
    ctx.issue_payload = Some(event.issue_payload.clone());
    ctx.project_key = event.project_key.clone();
    ctx.issue_key = event
        .issue_payload
        .get("key")
        .and_then(Value::as_str)
        .map(str::to_string);
    ctx
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
