//! Trigger manager (C9, spec §4.9): owns timers (cron), event subscriptions,
//! and webhook-inlet bindings, emitting fire events to the Engine.
//!
//! REDESIGN FLAGS: internal fan-out between this component and the Engine
//! is message passing over a bounded `tokio::mpsc` channel rather than an
//! event-emitter callback registry; timers are first-class scheduled tasks
//! with cancellation (via `JoinHandle::abort`) rather than one-shot
//! callbacks.

pub mod events;
pub mod inlet;
pub mod schedule;

use crate::audit::{AuditSink, EventKind, Outcome};
use crate::execution::ExecutionContext;
use crate::model::RuleId;
use crate::rule::Trigger;
use events::{EventSubscription, IssueEvent};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{instrument, warn};

/// A trigger activating a rule, handed to the Engine to run the execution
/// pipeline.
#[derive(Debug, Clone)]
pub struct Fire {
    pub rule_id: RuleId,
    pub context: ExecutionContext,
    pub triggered_by: String,
}

pub struct TriggerManager {
    fire_tx: mpsc::Sender<Fire>,
    event_subs: RwLock<HashMap<RuleId, Vec<EventSubscription>>>,
    schedules: RwLock<HashMap<RuleId, Vec<JoinHandle<()>>>>,
    inlets: RwLock<HashMap<String, HashSet<RuleId>>>,
    inlet_secrets: RwLock<HashMap<String, Option<String>>>,
    audit: Option<Arc<AuditSink>>,
}

impl TriggerManager {
    pub fn new(fire_tx: mpsc::Sender<Fire>) -> Self {
        Self {
            fire_tx,
            event_subs: RwLock::new(HashMap::new()),
            schedules: RwLock::new(HashMap::new()),
            inlets: RwLock::new(HashMap::new()),
            inlet_secrets: RwLock::new(HashMap::new()),
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Push a fire onto the bounded queue; a full queue drops the fire and
    /// records a medium-severity blocked audit event rather than applying
    /// backpressure to the subsystem that produced it (spec §4.10:
    /// "Triggers that would overflow the queue are dropped").
    async fn send_fire(&self, fire: Fire) {
        let rule_id = fire.rule_id;
        let triggered_by = fire.triggered_by.clone();
        if self.fire_tx.try_send(fire).is_err() {
            warn!(%rule_id, %triggered_by, "fire-queue full, dropping trigger fire");
            if let Some(audit) = &self.audit {
                let _ = audit
                    .record(
                        EventKind::TriggerBlocked,
                        "trigger.blocked",
                        None,
                        "fire_queue_overflow",
                        Some(rule_id.to_string()),
                        Outcome::Blocked,
                        serde_json::json!({ "triggered_by": triggered_by }),
                        None,
                    )
                    .await;
            }
        }
    }

    /// Install this rule's trigger registrations across all four
    /// subsystems. Callers (the Engine) invoke this only for enabled
    /// rules; a disabled rule is never bound (spec: "a disabled rule is
    /// never fired").
    pub async fn bind_rule(&self, rule_id: RuleId, triggers: &[Trigger]) {
        self.unbind_rule(rule_id).await;

        let mut subs = Vec::new();
        for trigger in triggers {
            if let Some(sub) = events::subscription_for(trigger) {
                subs.push(sub);
            }
            if let Some(schedule_trigger) = schedule::parse(trigger) {
                let handle = schedule_trigger.spawn(rule_id, self.fire_tx.clone());
                self.schedules.write().await.entry(rule_id).or_default().push(handle);
            }
            if let Some((inlet_id, secret)) = inlet::binding_for(trigger) {
                self.inlets.write().await.entry(inlet_id.clone()).or_default().insert(rule_id);
                self.inlet_secrets.write().await.insert(inlet_id, secret);
            }
        }
        if !subs.is_empty() {
            self.event_subs.write().await.insert(rule_id, subs);
        }
    }

    /// Tear down every registration this rule holds across all four
    /// subsystems (spec: "Teardown removes the rule's registrations from
    /// all four subsystems").
    pub async fn unbind_rule(&self, rule_id: RuleId) {
        self.event_subs.write().await.remove(&rule_id);
        if let Some(handles) = self.schedules.write().await.remove(&rule_id) {
            for handle in handles {
                handle.abort();
            }
        }
        let mut inlets = self.inlets.write().await;
        for rules in inlets.values_mut() {
            rules.remove(&rule_id);
        }
    }

    /// Push a pushed event `{kind, issue_payload}` through the event
    /// subscription broker, firing every active rule whose trigger matches.
    #[instrument(skip(self, event))]
    pub async fn handle_event(&self, event: IssueEvent) {
        let matches: Vec<RuleId> = {
            let subs = self.event_subs.read().await;
            subs.iter()
                .filter(|(_, rule_subs)| rule_subs.iter().any(|s| s.matches(&event)))
                .map(|(rule_id, _)| *rule_id)
                .collect()
        };
        for rule_id in matches {
            let ctx = events::context_for(&event);
            self.send_fire(Fire {
                rule_id,
                context: ctx,
                triggered_by: "event".to_string(),
            })
            .await;
        }
    }

    /// Verify and dispatch an inbound webhook to every rule bound to
    /// `inlet_id`. Returns `false` if the signature doesn't verify (the
    /// caller should reject the request without firing anything).
    pub async fn handle_webhook(&self, inlet_id: &str, body: &str, signature_header: Option<&str>, payload: serde_json::Value) -> bool {
        if let Some(Some(secret)) = self.inlet_secrets.read().await.get(inlet_id).cloned() {
            let Some(sig) = signature_header else { return false };
            if !crate::webhook::signature::verify(body, sig, &secret) {
                return false;
            }
        }

        let rule_ids: Vec<RuleId> = self
            .inlets
            .read()
            .await
            .get(inlet_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        for rule_id in rule_ids {
            let mut ctx = ExecutionContext::new();
            ctx.webhook_payload = Some(payload.clone());
            self.send_fire(Fire {
                rule_id,
                context: ctx,
                triggered_by: "webhook".to_string(),
            })
            .await;
        }
        true
    }

    /// Shut down all owned resources: abort every scheduled timer.
    pub async fn shutdown(&self) {
        let mut schedules = self.schedules.write().await;
        for (_, handles) in schedules.drain() {
            for handle in handles {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
