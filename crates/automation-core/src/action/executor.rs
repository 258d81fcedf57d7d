//! Action executor (C6, spec §4.6): thin dispatcher over a fixed registry of
//! `ActionAdapter`s, one per `ActionType`.
//!
//! REDESIGN FLAGS: dynamic dispatch by action type is replaced by a closed
//! registry keyed by `ActionType`, built once at startup and fixed
//! thereafter.

use crate::execution::{ActionResult, ExecutionContext};
use crate::model::ActionType;
use crate::rule::Action;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{field} required")]
    MissingField { field: String },
    #[error("adapter error: {0}")]
    Adapter(String),
    #[error(transparent)]
    Tracker(#[from] tracker_client::ApiError),
}

impl ActionError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField { field: field.into() }
    }
}

/// The uniform seam every action type implements (spec §4.6.1).
#[async_trait]
pub trait ActionAdapter: Send + Sync {
    fn action_type(&self) -> ActionType;

    /// Validate the config has everything this adapter needs before
    /// `execute` runs. Default: no extra validation beyond what `execute`
    /// itself enforces.
    fn validate(&self, _config: &Value) -> Result<(), ActionError> {
        Ok(())
    }

    async fn execute(&self, config: &Value, ctx: &ExecutionContext) -> Result<Value, ActionError>;

    /// Let an adapter that succeeds at the HTTP level still report a failed
    /// outcome from its own returned data, e.g. `bulk-operation`'s partial
    /// failures (spec §4.10: "Terminal status: COMPLETED if failed == 0,
    /// else FAILED"). Returning `Some(message)` turns an `Ok` execute result
    /// into a failed `ActionResult` that still carries the adapter's data.
    /// Default: never override (ordinary HTTP-call adapters have no
    /// partial-failure concept).
    fn failure_message(&self, _data: &Value) -> Option<String> {
        None
    }
}

/// Fixed registry of adapters, populated once at startup (Engine
/// construction) and never mutated afterward.
pub struct ActionAdapterRegistry {
    adapters: HashMap<ActionType, Box<dyn ActionAdapter>>,
}

impl ActionAdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(mut self, adapter: Box<dyn ActionAdapter>) -> Self {
        self.adapters.insert(adapter.action_type(), adapter);
        self
    }

    pub fn get(&self, action_type: ActionType) -> Option<&dyn ActionAdapter> {
        self.adapters.get(&action_type).map(|b| b.as_ref())
    }
}

impl Default for ActionAdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Execute one resolved action against its adapter: validate required
/// fields, time the call, wrap adapter errors into a failed result, and
/// record duration (spec §4.6 steps 1-5).
#[instrument(skip(registry, resolved_config, ctx))]
pub async fn execute_action(
    registry: &ActionAdapterRegistry,
    action: &Action,
    resolved_config: &Value,
    ctx: &ExecutionContext,
) -> ActionResult {
    let start = Instant::now();
    let Some(adapter) = registry.get(action.action_type) else {
        return ActionResult::failed(
            action.action_type,
            format!("no adapter registered for {}", action.action_type),
            start.elapsed().as_millis() as u64,
        );
    };

    if let Err(e) = adapter.validate(resolved_config) {
        return ActionResult::failed(action.action_type, e.to_string(), start.elapsed().as_millis() as u64);
    }

    match adapter.execute(resolved_config, ctx).await {
        Ok(data) => match adapter.failure_message(&data) {
            Some(message) => ActionResult::failed_with_data(action.action_type, message, data, start.elapsed().as_millis() as u64),
            None => ActionResult::success(action.action_type, Some(data), start.elapsed().as_millis() as u64),
        },
        Err(e) => ActionResult::failed(action.action_type, e.to_string(), start.elapsed().as_millis() as u64),
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
