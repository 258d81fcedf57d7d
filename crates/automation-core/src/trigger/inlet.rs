//! Webhook inlet subsystem (spec §4.9 "Webhook inlets"): binding from
//! inlet id to list of rule ids; on incoming webhook (verified by C5), fire
//! all bound rules with the raw payload as context.

use crate::model::TriggerType;
use crate::rule::Trigger;

/// Extract `(inlet_id, secret)` from a `WEBHOOK` trigger's config.
pub fn binding_for(trigger: &Trigger) -> Option<(String, Option<String>)> {
    if trigger.trigger_type != TriggerType::Webhook {
        return None;
    }
    let inlet_id = trigger.config.get("inlet_id")?.as_str()?.to_string();
    let secret = trigger
        .config
        .get("secret")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);
    Some((inlet_id, secret))
}

#[cfg(test)]
#[path = "inlet_tests.rs"]
mod tests;
