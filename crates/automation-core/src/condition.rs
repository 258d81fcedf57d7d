//! Condition evaluator (C8, spec §4.8): left-to-right fold over a rule's
//! conditions using their declared combinators, no precedence.

use crate::execution::ExecutionContext;
use crate::model::{Combinator, ConditionType};
use crate::rule::Condition;
use crate::smart_value;
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracker_client::{ApiError, TrackerClient};

#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("condition references project but context has no project_key")]
    MissingProjectKey,
    #[error("condition references issue but context has no issue_payload")]
    MissingIssuePayload,
    #[error("condition references user but context has no user_id")]
    MissingUserId,
    #[error("malformed condition config: {0}")]
    MalformedConfig(String),
    #[error(transparent)]
    Tracker(#[from] ApiError),
}

/// Evaluate the full ordered list of conditions as a left-to-right fold.
/// The first condition has no combinator and seeds the accumulator. On any
/// evaluation error the caller should treat the rule as not-matched (spec:
/// "execution is skipped, not a failure") — this function surfaces the
/// error so the engine can do exactly that and log why.
pub async fn evaluate_all(
    conditions: &[Condition],
    ctx: &ExecutionContext,
    client: &TrackerClient,
) -> Result<bool, ConditionError> {
    let mut iter = conditions.iter();
    let first = match iter.next() {
        None => return Ok(true),
        Some(c) => c,
    };

    let mut acc = evaluate_one(first, ctx, client).await?;
    for condition in iter {
        let combinator = condition.combinator.unwrap_or(Combinator::And);
        let value = evaluate_one(condition, ctx, client).await?;
        acc = match combinator {
            Combinator::And => acc && value,
            Combinator::Or => acc || value,
        };
    }
    Ok(acc)
}

async fn evaluate_one(
    condition: &Condition,
    ctx: &ExecutionContext,
    client: &TrackerClient,
) -> Result<bool, ConditionError> {
    match condition.condition_type {
        ConditionType::TrackerQuery => {
            let jql = condition
                .config
                .get("jql")
                .and_then(Value::as_str)
                .ok_or_else(|| ConditionError::MalformedConfig("jql is required".into()))?;
            let result = client.search(jql, 0, 1).await?;
            Ok(result.total > 0)
        }
        ConditionType::FieldValue => evaluate_field_value(condition, ctx),
        ConditionType::UserInGroup => {
            let user_id = ctx.user_id.as_deref().ok_or(ConditionError::MissingUserId)?;
            let group_name = condition
                .config
                .get("group")
                .and_then(Value::as_str)
                .ok_or_else(|| ConditionError::MalformedConfig("group is required".into()))?;
            let group = client.get_group(group_name).await?;
            Ok(group.members.iter().any(|m| m == user_id))
        }
        ConditionType::ProjectCategory => {
            let project_key = ctx
                .project_key
                .as_deref()
                .ok_or(ConditionError::MissingProjectKey)?;
            let expected_category = condition
                .config
                .get("category_id")
                .and_then(Value::as_str)
                .ok_or_else(|| ConditionError::MalformedConfig("category_id is required".into()))?;
            let project = client.get_project(project_key).await?;
            Ok(project.category_id.as_deref() == Some(expected_category))
        }
        ConditionType::IssueAge => {
            let issue = ctx
                .issue_payload
                .as_ref()
                .ok_or(ConditionError::MissingIssuePayload)?;
            let created_str = issue
                .get("created")
                .and_then(Value::as_str)
                .ok_or_else(|| ConditionError::MalformedConfig("issue.created is missing".into()))?;
            let created = chrono::DateTime::parse_from_rfc3339(created_str)
                .map_err(|e| ConditionError::MalformedConfig(e.to_string()))?
                .with_timezone(&Utc);
            let min_days = condition
                .config
                .get("days")
                .and_then(Value::as_i64)
                .ok_or_else(|| ConditionError::MalformedConfig("days is required".into()))?;
            let age_days = (Utc::now() - created).num_days();
            Ok(age_days >= min_days)
        }
        ConditionType::SmartValue => {
            let expression = condition
                .config
                .get("expression")
                .and_then(Value::as_str)
                .ok_or_else(|| ConditionError::MalformedConfig("expression is required".into()))?;
            Ok(smart_value::resolve_truthy(expression, ctx))
        }
        ConditionType::CustomScript => {
            // Spec §4.8/§9: must not evaluate host code. Validation denies
            // this condition type outright, but an already-stored rule
            // (e.g. loaded before validation tightened) degrades safely to
            // a boolean-literal false rather than ever invoking a sandbox.
            Ok(false)
        }
    }
}

fn evaluate_field_value(condition: &Condition, ctx: &ExecutionContext) -> Result<bool, ConditionError> {
    let issue = ctx
        .issue_payload
        .as_ref()
        .ok_or(ConditionError::MissingIssuePayload)?;
    let field_path = condition
        .config
        .get("field")
        .and_then(Value::as_str)
        .ok_or_else(|| ConditionError::MalformedConfig("field is required".into()))?;
    let comparator = condition
        .config
        .get("comparator")
        .and_then(Value::as_str)
        .unwrap_or("eq");
    let expected = condition.config.get("value").cloned().unwrap_or(Value::Null);

    let actual = field_path
        .split('.')
        .fold(Some(issue), |cur, seg| cur?.as_object()?.get(seg))
        .cloned()
        .unwrap_or(Value::Null);

    Ok(match comparator {
        "eq" => actual == expected,
        "ne" => actual != expected,
        "contains" => match (&actual, &expected) {
            (Value::String(a), Value::String(b)) => a.contains(b.as_str()),
            (Value::Array(a), _) => a.contains(&expected),
            _ => false,
        },
        "gt" => compare_numbers(&actual, &expected).map(|o| o.is_gt()).unwrap_or(false),
        "lt" => compare_numbers(&actual, &expected).map(|o| o.is_lt()).unwrap_or(false),
        _ => false,
    })
}

fn compare_numbers(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

#[cfg(test)]
#[path = "condition_tests.rs"]
mod tests;
