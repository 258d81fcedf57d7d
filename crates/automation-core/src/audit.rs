//! Audit sink (C3, spec §4.3): structured, append-only, daily-rotated event
//! log with redaction of secret-shaped keys.

use crate::model::PrincipalId;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const SENSITIVE_MARKERS: &[&str] = &["password", "token", "secret", "key", "credential"];
const REDACTED: &str = "***REDACTED***";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// The kind of event being recorded, used to derive `Severity` when the
/// caller does not pin one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    SecurityViolation,
    AuthenticationFailure,
    BlockedAuthorization,
    DestructiveExecution,
    ConfigurationChange,
    ToolExecution,
    /// A trigger fire dropped because the engine's fire-queue was full
    /// (spec §4.10 concurrency bound).
    TriggerBlocked,
    Error,
    Other,
}

impl EventKind {
    fn severity(self, outcome: Outcome) -> Severity {
        match self {
            Self::SecurityViolation => Severity::Critical,
            Self::AuthenticationFailure | Self::BlockedAuthorization => Severity::High,
            Self::DestructiveExecution if outcome == Outcome::Success => Severity::High,
            Self::ConfigurationChange => Severity::High,
            Self::ToolExecution => Severity::Low,
            Self::TriggerBlocked => Severity::Medium,
            Self::Error => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: chrono::DateTime<Utc>,
    pub event_type: String,
    pub principal: Option<String>,
    pub action: String,
    pub resource: Option<String>,
    pub outcome: Outcome,
    pub severity: Severity,
    pub details: Value,
    pub request_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to write audit record: {0}")]
    Io(#[from] io::Error),
    #[error("failed to serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Redact the value of any key whose lower-cased name matches the
/// sensitivity list, recursively through objects and arrays.
pub fn redact(details: &Value) -> Value {
    match details {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let lower = k.to_lowercase();
                if SENSITIVE_MARKERS.iter().any(|m| lower.contains(m)) {
                    out.insert(k.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(k.clone(), redact(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

/// Appends one JSON line per event to `audit-YYYY-MM-DD.jsonl` under a
/// configured directory. Writers are serialized by an internal mutex per
/// the "one appender per file" shared-resource policy in §5.
pub struct AuditSink {
    dir: PathBuf,
    enabled: bool,
    append_lock: Mutex<()>,
    // Guards the cached file handle for the "current" day so repeated
    // writes within the same day don't reopen the file each time.
    current: StdMutex<Option<(NaiveDate, PathBuf)>>,
}

impl AuditSink {
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            enabled,
            append_lock: Mutex::new(()),
            current: StdMutex::new(None),
        }
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("audit-{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Record a structured event. Sanitizes `details` before writing and
    /// derives `severity` from `kind`/`outcome` if not already decided by
    /// the caller.
    pub async fn record(
        &self,
        kind: EventKind,
        event_type: impl Into<String>,
        principal: Option<&PrincipalId>,
        action: impl Into<String>,
        resource: Option<String>,
        outcome: Outcome,
        details: Value,
        request_id: Option<String>,
    ) -> Result<(), AuditError> {
        if !self.enabled {
            return Ok(());
        }

        let record = AuditRecord {
            timestamp: Utc::now(),
            event_type: event_type.into(),
            principal: principal.map(|p| p.to_string()),
            action: action.into(),
            resource,
            outcome,
            severity: kind.severity(outcome),
            details: redact(&details),
            request_id,
        };

        self.write(&record).await
    }

    async fn write(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let _guard = self.append_lock.lock().await;
        fs::create_dir_all(&self.dir).await?;

        let today = record.timestamp.date_naive();
        let path = self.path_for(today);
        *self.current.lock().unwrap() = Some((today, path.clone()));

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&path).await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    pub fn current_file(&self) -> Option<PathBuf> {
        self.current.lock().unwrap().as_ref().map(|(_, p)| p.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
