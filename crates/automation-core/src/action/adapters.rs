//! The eleven action-type adapters (spec §4.6), each built on
//! `tracker-client`'s typed endpoint wrappers.
//!
//! All adapters are deterministic in payload construction: no wall-clock or
//! random data enters an outgoing request body, so calls are stable to
//! compare byte-for-byte (modulo timestamps the tracker itself stamps).

use super::executor::{ActionAdapter, ActionError};
use crate::bulk::{BulkItemOutcome, BulkProgressStore};
use crate::execution::ExecutionContext;
use crate::model::ActionType;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracker_client::{Comment, CommentVisibility, CreateIssueRequest, TrackerClient, UpdateIssueRequest};

fn require_str<'a>(config: &'a Value, field: &str) -> Result<&'a str, ActionError> {
    config
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ActionError::missing(field))
}

fn ctx_issue_key(config: &Value, ctx: &ExecutionContext) -> Result<String, ActionError> {
    config
        .get("issue_key")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| ctx.issue_key.clone())
        .ok_or_else(|| ActionError::missing("issue_key"))
}

/// **update-issue**: requires `context.issue_key` and a non-empty `fields`
/// map; PUTs the map onto the tracker issue.
pub struct UpdateIssueAdapter {
    client: Arc<TrackerClient>,
}

impl UpdateIssueAdapter {
    pub fn new(client: Arc<TrackerClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionAdapter for UpdateIssueAdapter {
    fn action_type(&self) -> ActionType {
        ActionType::UpdateIssue
    }

    async fn execute(&self, config: &Value, ctx: &ExecutionContext) -> Result<Value, ActionError> {
        let issue_key = ctx_issue_key(config, ctx)?;
        let fields = config
            .get("fields")
            .and_then(Value::as_object)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ActionError::missing("fields"))?;
        let request = UpdateIssueRequest {
            fields: fields.clone().into_iter().collect(),
        };
        self.client.update_issue(&issue_key, &request).await?;
        Ok(json!({ "issue_key": issue_key }))
    }
}

/// **transition-issue**: requires `transition_id` or `transition_name`; a
/// name is resolved to an id by exact, case-sensitive match.
pub struct TransitionIssueAdapter {
    client: Arc<TrackerClient>,
}

impl TransitionIssueAdapter {
    pub fn new(client: Arc<TrackerClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionAdapter for TransitionIssueAdapter {
    fn action_type(&self) -> ActionType {
        ActionType::TransitionIssue
    }

    async fn execute(&self, config: &Value, ctx: &ExecutionContext) -> Result<Value, ActionError> {
        let issue_key = ctx_issue_key(config, ctx)?;
        let transition_id = match config.get("transition_id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let name = require_str(config, "transition_name")?;
                self.client.resolve_transition_id(&issue_key, name).await?
            }
        };
        self.client.apply_transition(&issue_key, &transition_id).await?;
        Ok(json!({ "issue_key": issue_key, "transition_id": transition_id }))
    }
}

/// **create-issue**: requires `project_key`, `issue_type`, `summary`.
pub struct CreateIssueAdapter {
    client: Arc<TrackerClient>,
}

impl CreateIssueAdapter {
    pub fn new(client: Arc<TrackerClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionAdapter for CreateIssueAdapter {
    fn action_type(&self) -> ActionType {
        ActionType::CreateIssue
    }

    async fn execute(&self, config: &Value, _ctx: &ExecutionContext) -> Result<Value, ActionError> {
        let project_key = require_str(config, "project_key")?.to_string();
        let issue_type = require_str(config, "issue_type")?.to_string();
        let summary = require_str(config, "summary")?.to_string();
        let fields: HashMap<String, Value> = config
            .get("fields")
            .and_then(Value::as_object)
            .map(|m| m.clone().into_iter().collect())
            .unwrap_or_default();
        let request = CreateIssueRequest {
            project_key,
            issue_type,
            summary,
            fields,
        };
        let created = self.client.create_issue(&request).await?;
        Ok(json!({ "key": created.key, "id": created.id }))
    }
}

/// **add-comment**: requires a non-empty body; `visibility="internal"`
/// restricts the comment to administrators.
pub struct AddCommentAdapter {
    client: Arc<TrackerClient>,
}

impl AddCommentAdapter {
    pub fn new(client: Arc<TrackerClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionAdapter for AddCommentAdapter {
    fn action_type(&self) -> ActionType {
        ActionType::AddComment
    }

    async fn execute(&self, config: &Value, ctx: &ExecutionContext) -> Result<Value, ActionError> {
        let issue_key = ctx_issue_key(config, ctx)?;
        let body = require_str(config, "body")?.to_string();
        let visibility = match config.get("visibility").and_then(Value::as_str) {
            Some("internal") => Some(CommentVisibility {
                visibility_type: "role".to_string(),
                value: "Administrators".to_string(),
            }),
            _ => None,
        };
        self.client
            .add_comment(&issue_key, &Comment { body, visibility })
            .await?;
        Ok(json!({ "issue_key": issue_key }))
    }
}

/// **assign-issue**: `assignee_id` or `assignee_email`; neither unassigns.
pub struct AssignIssueAdapter {
    client: Arc<TrackerClient>,
}

impl AssignIssueAdapter {
    pub fn new(client: Arc<TrackerClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionAdapter for AssignIssueAdapter {
    fn action_type(&self) -> ActionType {
        ActionType::AssignIssue
    }

    async fn execute(&self, config: &Value, ctx: &ExecutionContext) -> Result<Value, ActionError> {
        let issue_key = ctx_issue_key(config, ctx)?;
        let assignee_id = if let Some(id) = config.get("assignee_id").and_then(Value::as_str) {
            Some(id.to_string())
        } else if let Some(email) = config.get("assignee_email").and_then(Value::as_str) {
            self.client
                .find_user_by_email(email)
                .await?
                .map(|u| u.account_id)
        } else {
            None
        };
        self.client.assign_issue(&issue_key, assignee_id.as_deref()).await?;
        Ok(json!({ "issue_key": issue_key, "assignee_id": assignee_id }))
    }
}

/// **send-notification**: requires a non-empty recipient list; success just
/// requires at least one recipient, the delivery mechanism is a stub.
pub struct SendNotificationAdapter;

#[async_trait]
impl ActionAdapter for SendNotificationAdapter {
    fn action_type(&self) -> ActionType {
        ActionType::SendNotification
    }

    async fn execute(&self, config: &Value, _ctx: &ExecutionContext) -> Result<Value, ActionError> {
        let recipients = config
            .get("recipients")
            .and_then(Value::as_array)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ActionError::missing("recipients"))?;
        let channel = config.get("channel").and_then(Value::as_str).unwrap_or("email");
        Ok(json!({ "channel": channel, "recipient_count": recipients.len() }))
    }
}

/// **webhook-call**: requires `url`; POSTs a JSON body with merged headers.
/// This is a direct one-off call, distinct from the integration dispatcher's
/// subscribed-event fan-out.
pub struct WebhookCallAdapter {
    http: reqwest::Client,
}

impl WebhookCallAdapter {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ActionAdapter for WebhookCallAdapter {
    fn action_type(&self) -> ActionType {
        ActionType::WebhookCall
    }

    async fn execute(&self, config: &Value, _ctx: &ExecutionContext) -> Result<Value, ActionError> {
        let url = require_str(config, "url")?.to_string();
        let body = config.get("body").cloned().unwrap_or(json!({}));
        let mut request = self
            .http
            .post(&url)
            .header("content-type", "application/json");
        if let Some(headers) = config.get("headers").and_then(Value::as_object) {
            for (key, value) in headers {
                if let Some(v) = value.as_str() {
                    request = request.header(key.as_str(), v);
                }
            }
        }
        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| ActionError::Adapter(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ActionError::Adapter(format!("webhook call returned {status}")));
        }
        Ok(json!({ "url": url, "status": status.as_u16() }))
    }
}

/// **create-subtask**: resolves the parent (defaulting to `context.issue_key`)
/// to find its project, then creates a sub-task under it.
pub struct CreateSubtaskAdapter {
    client: Arc<TrackerClient>,
}

impl CreateSubtaskAdapter {
    pub fn new(client: Arc<TrackerClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionAdapter for CreateSubtaskAdapter {
    fn action_type(&self) -> ActionType {
        ActionType::CreateSubtask
    }

    async fn execute(&self, config: &Value, ctx: &ExecutionContext) -> Result<Value, ActionError> {
        let parent_key = config
            .get("parent_issue_key")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| ctx.issue_key.clone())
            .ok_or_else(|| ActionError::missing("parent_issue_key"))?;
        let summary = require_str(config, "summary")?.to_string();
        let parent = self.client.get_issue(&parent_key).await?;
        let project_key = parent
            .project_key()
            .map(str::to_string)
            .ok_or_else(|| ActionError::Adapter("parent issue has no project".to_string()))?;
        let mut fields: HashMap<String, Value> = config
            .get("fields")
            .and_then(Value::as_object)
            .map(|m| m.clone().into_iter().collect())
            .unwrap_or_default();
        fields.insert(
            "parent".to_string(),
            json!({ "key": parent_key }),
        );
        let request = CreateIssueRequest {
            project_key,
            issue_type: "Sub-task".to_string(),
            summary,
            fields,
        };
        let created = self.client.create_issue(&request).await?;
        Ok(json!({ "key": created.key, "id": created.id, "parent_issue_key": parent_key }))
    }
}

/// **link-issues**: links `context.issue_key` (inward) to `target_issue_key`
/// (outward) with a named link type.
pub struct LinkIssuesAdapter {
    client: Arc<TrackerClient>,
}

impl LinkIssuesAdapter {
    pub fn new(client: Arc<TrackerClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionAdapter for LinkIssuesAdapter {
    fn action_type(&self) -> ActionType {
        ActionType::LinkIssues
    }

    async fn execute(&self, config: &Value, ctx: &ExecutionContext) -> Result<Value, ActionError> {
        let source_key = ctx_issue_key(config, ctx)?;
        let target_key = require_str(config, "target_issue_key")?.to_string();
        let link_type = config.get("link_type").and_then(Value::as_str).unwrap_or("relates to");
        self.client.link_issues(&source_key, &target_key, link_type).await?;
        Ok(json!({ "source": source_key, "target": target_key, "link_type": link_type }))
    }
}

/// **update-custom-field**: PUT `{fields: {<customFieldId>: value}}`.
pub struct UpdateCustomFieldAdapter {
    client: Arc<TrackerClient>,
}

impl UpdateCustomFieldAdapter {
    pub fn new(client: Arc<TrackerClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionAdapter for UpdateCustomFieldAdapter {
    fn action_type(&self) -> ActionType {
        ActionType::UpdateCustomField
    }

    async fn execute(&self, config: &Value, ctx: &ExecutionContext) -> Result<Value, ActionError> {
        let issue_key = ctx_issue_key(config, ctx)?;
        let field_id = require_str(config, "field_id")?.to_string();
        let value = config
            .get("value")
            .cloned()
            .ok_or_else(|| ActionError::missing("value"))?;
        let mut fields = HashMap::new();
        fields.insert(field_id.clone(), value);
        self.client
            .update_issue(&issue_key, &UpdateIssueRequest { fields })
            .await?;
        Ok(json!({ "issue_key": issue_key, "field_id": field_id }))
    }
}

/// **bulk-operation** (spec §4.10): runs a tracker query in batches,
/// applying a field mutation to each matched issue and reporting progress
/// through the engine-owned [`BulkProgressStore`].
pub struct BulkOperationAdapter {
    client: Arc<TrackerClient>,
    store: Arc<dyn BulkProgressStore>,
}

impl BulkOperationAdapter {
    pub fn new(client: Arc<TrackerClient>, store: Arc<dyn BulkProgressStore>) -> Self {
        Self { client, store }
    }
}

#[async_trait]
impl ActionAdapter for BulkOperationAdapter {
    fn action_type(&self) -> ActionType {
        ActionType::BulkOperation
    }

    fn failure_message(&self, data: &Value) -> Option<String> {
        let failed = data.get("failed").and_then(Value::as_u64).unwrap_or(0);
        if failed > 0 {
            Some(format!("{failed} of {} items failed", data.get("total").and_then(Value::as_u64).unwrap_or(0)))
        } else {
            None
        }
    }

    async fn execute(&self, config: &Value, ctx: &ExecutionContext) -> Result<Value, ActionError> {
        let jql = require_str(config, "jql")?.to_string();
        let batch_size = config.get("batch_size").and_then(Value::as_u64).unwrap_or(100).max(1) as u32;
        let max_issues = config.get("max_issues").and_then(Value::as_u64).unwrap_or(u64::MAX);
        let fields = config
            .get("fields")
            .and_then(Value::as_object)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ActionError::missing("fields"))?;
        let rule_id = ctx.rule_id.unwrap_or_else(crate::model::RuleId::new);

        let first_page = self.client.search(&jql, 0, batch_size).await?;
        let total = first_page.total.min(max_issues);
        let id = self.store.create(rule_id, total).await;

        let mut start_at = 0u64;
        let mut remaining = total;
        let mut page = first_page;
        loop {
            if remaining == 0 {
                break;
            }
            let batch_start = std::time::Instant::now();
            let mut outcomes = Vec::with_capacity(page.issues.len().min(remaining as usize));
            for issue_ref in page.issues.iter().take(remaining as usize) {
                let request = UpdateIssueRequest {
                    fields: fields.clone().into_iter().collect(),
                };
                let outcome = self.client.update_issue(&issue_ref.key, &request).await;
                outcomes.push(match outcome {
                    Ok(()) => BulkItemOutcome::Success,
                    Err(e) => BulkItemOutcome::Failure { item_key: issue_ref.key.clone(), error: e.to_string() },
                });
            }
            let batch_duration = batch_start.elapsed();
            if !outcomes.is_empty() {
                self.store
                    .update(id, Box::new(move |p| p.record_batch(outcomes, batch_duration)))
                    .await;
            }
            remaining = remaining.saturating_sub(page.issues.len() as u64);
            start_at += page.issues.len() as u64;
            if remaining == 0 || page.issues.is_empty() {
                break;
            }
            page = self.client.search(&jql, start_at, batch_size).await?;
        }

        self.store
            .update(id, Box::new(|p| p.finish()))
            .await;
        let progress = self.store.get(id).await;
        Ok(json!({
            "bulk_operation_id": id.to_string(),
            "total": total,
            "succeeded": progress.as_ref().map(|p| p.succeeded).unwrap_or(0),
            "failed": progress.as_ref().map(|p| p.failed).unwrap_or(0),
        }))
    }
}

#[cfg(test)]
#[path = "adapters_tests.rs"]
mod tests;
