//! Wire-level tracker types.
//!
//! These mirror the tracker's REST representations closely enough for the
//! Action Executor and Condition Evaluator to work with; they are not a
//! general-purpose schema validator (that is out of scope per the engine
//! spec — only the compressed field-type vocabulary in [`FieldType`] is
//! modeled here).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A tracker issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub key: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Issue {
    /// Look up a dotted field path within `fields`, the way the Smart-Value
    /// Resolver and `FIELD_VALUE` condition do.
    pub fn field_path(&self, path: &str) -> Option<&serde_json::Value> {
        let mut current = self.fields.get(path.split('.').next()?)?;
        for segment in path.split('.').skip(1) {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn project_key(&self) -> Option<&str> {
        self.fields
            .get("project")?
            .as_object()?
            .get("key")?
            .as_str()
    }

    pub fn issue_type(&self) -> Option<&str> {
        self.fields
            .get("issuetype")?
            .as_object()?
            .get("name")?
            .as_str()
    }
}

/// Minimal reference to an issue, as returned from search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRef {
    pub id: String,
    pub key: String,
}

/// Request body for creating a comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<CommentVisibility>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentVisibility {
    #[serde(rename = "type")]
    pub visibility_type: String,
    pub value: String,
}

/// A possible workflow transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    pub name: String,
}

/// A tracker user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub account_id: String,
    pub display_name: String,
    pub email_address: Option<String>,
}

/// A tracker project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub key: String,
    pub name: String,
    pub category_id: Option<String>,
}

/// A named group of users, used by the `USER_IN_GROUP` condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub members: Vec<String>,
}

/// Result of a tracker search (JQL-equivalent query).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub total: u64,
    pub issues: Vec<IssueRef>,
}

/// The compressed field type vocabulary the Field Schema Cache validates
/// against. Tracker-specific custom type strings compress into one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Array,
    Option,
    Date,
    DateTime,
}

impl FieldType {
    /// Compress a tracker-specific custom field type string into the closed
    /// vocabulary the cache works with.
    pub fn compress(raw_type: &str) -> Self {
        match raw_type {
            t if t.contains("datetime") || t.contains("timestamp") => Self::DateTime,
            t if t.contains("date") => Self::Date,
            t if t.contains("number") || t.contains("float") || t.contains("integer") => {
                Self::Number
            }
            t if t.contains("array") || t.contains("multi") => Self::Array,
            t if t.contains("select") || t.contains("option") || t.contains("radio") => {
                Self::Option
            }
            _ => Self::String,
        }
    }
}

/// Metadata for a single field as returned by the tracker, already
/// compressed into the closed type vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    pub id: String,
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub allowed_values: Option<Vec<String>>,
}

/// Request body for creating an issue.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateIssueRequest {
    pub project_key: String,
    pub issue_type: String,
    pub summary: String,
    #[serde(default)]
    pub fields: HashMap<String, serde_json::Value>,
}

/// Request body for updating an issue's fields.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateIssueRequest {
    pub fields: HashMap<String, serde_json::Value>,
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
