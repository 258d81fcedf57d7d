//! WebhookIntegration data model (§3): a registered outbound delivery
//! target with its own retry policy and optional signing secret.

use crate::model::IntegrationId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// `delay(attempt) = min(initial * multiplier^attempt, max_delay)`.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let scaled = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        scaled.min(self.max_delay_ms as f64) as u64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookIntegration {
    pub id: IntegrationId,
    pub name: String,
    pub url: String,
    pub secret: Option<String>,
    #[serde(default)]
    pub events: HashSet<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub retry_policy: RetryPolicy,
    pub enabled: bool,
}

impl WebhookIntegration {
    /// `events` empty means "all events".
    pub fn subscribes_to(&self, event: &str) -> bool {
        self.events.is_empty() || self.events.contains(event)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookIntegrationSpec {
    pub name: String,
    pub url: String,
    pub secret: Option<String>,
    #[serde(default)]
    pub events: HashSet<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl WebhookIntegration {
    pub fn from_spec(spec: WebhookIntegrationSpec) -> Self {
        Self {
            id: IntegrationId::new(),
            name: spec.name,
            url: spec.url,
            secret: spec.secret,
            events: spec.events,
            headers: spec.headers,
            retry_policy: spec.retry_policy,
            enabled: spec.enabled,
        }
    }
}

#[cfg(test)]
#[path = "integration_tests.rs"]
mod tests;
