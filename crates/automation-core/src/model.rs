//! Ambient identifier newtypes and the closed enumerations shared across the
//! data model (§3): trigger/condition/action types, execution status, and
//! the AND/OR combinator.
//!
//! Every opaque identifier gets its own validated type rather than a bare
//! `String`, wrapping a ULID the same way other identifier newtypes in this
//! codebase do. IDs are lexicographically sortable, which lines up with the
//! `triggered_at`-descending ordering `get_executions` promises.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

macro_rules! ulid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            pub fn as_ulid(&self) -> Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Ulid::from_str(s)?))
            }
        }
    };
}

ulid_id!(RuleId);
ulid_id!(ExecutionId);
ulid_id!(BulkOperationId);
ulid_id!(IntegrationId);

/// A caller identity used for rate limiting and permission decisions.
/// Unlike the other ids this is supplied by the caller, not minted by the
/// engine, so it wraps an arbitrary non-empty string rather than a ULID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PrincipalId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Trigger types from §3. `config` wellformedness per type is validated in
/// `rule::validate_trigger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    IssueCreated,
    IssueUpdated,
    IssueTransitioned,
    IssueCommented,
    FieldChanged,
    SlaBreach,
    Scheduled,
    Webhook,
    Manual,
}

/// Condition types from §4.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionType {
    TrackerQuery,
    FieldValue,
    UserInGroup,
    ProjectCategory,
    IssueAge,
    SmartValue,
    CustomScript,
}

/// `FIELD_VALUE` condition comparators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Eq,
    Ne,
    Contains,
    Gt,
    Lt,
}

/// Boolean combinator joining one condition to the fold accumulated from the
/// conditions before it. The first condition in a rule has no combinator
/// (nothing precedes it), which `rule::Condition::combinator` models as
/// `Option<Combinator>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    And,
    Or,
}

/// Action types from §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    UpdateIssue,
    TransitionIssue,
    CreateIssue,
    AddComment,
    AssignIssue,
    SendNotification,
    WebhookCall,
    BulkOperation,
    CreateSubtask,
    LinkIssues,
    UpdateCustomField,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        write!(f, "{s}")
    }
}

/// Execution lifecycle status from §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled
        )
    }
}

/// Per-action outcome status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionResultStatus {
    Success,
    Failed,
    Skipped,
}

/// `BulkOperationProgress` and tracker-query-driven status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BulkStatus {
    Running,
    Completed,
    Failed,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
