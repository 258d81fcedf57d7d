//! Scheduled timer subsystem (spec §4.9 "Scheduled timers"): one timer per
//! scheduled trigger, respecting `timezone` and `cron_expression`.
//!
//! REDESIGN FLAGS: cron is parsed into a next-tick function (`cron::Schedule`
//! plus a timezone) rather than driven by a library callback; the spawned
//! task is a first-class cancellation token (`JoinHandle`) owned by the
//! `TriggerManager`.

use crate::execution::ExecutionContext;
use crate::model::RuleId;
use crate::rule::Trigger;
use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use super::Fire;

pub struct ScheduledTrigger {
    cron_expression: String,
    timezone: Tz,
    payload: serde_json::Value,
}

/// Parse a `SCHEDULED` trigger's config. Returns `None` for every other
/// trigger type, and logs (rather than panics) on a malformed cron
/// expression — malformed schedules should have been rejected at
/// `validate_spec` time, but a stored rule from before that check existed
/// degrades to "never fires" instead of crashing the engine.
pub fn parse(trigger: &Trigger) -> Option<ScheduledTrigger> {
    if trigger.trigger_type != crate::model::TriggerType::Scheduled {
        return None;
    }
    let cron_expression = trigger.config.get("cron_expression")?.as_str()?.to_string();
    let timezone_str = trigger.config.get("timezone")?.as_str()?;
    let timezone = Tz::from_str(timezone_str).ok()?;
    let payload = trigger.config.get("payload").cloned().unwrap_or(serde_json::Value::Null);

    if CronSchedule::from_str(&cron_expression).is_err() {
        warn!(cron_expression, "invalid cron expression, trigger will not fire");
        return None;
    }

    Some(ScheduledTrigger {
        cron_expression,
        timezone,
        payload,
    })
}

impl ScheduledTrigger {
    /// Spawn the timer task. On each tick it fires with an empty issue
    /// context and the trigger payload (spec: "fire with empty issue
    /// context and the trigger payload").
    pub fn spawn(self, rule_id: RuleId, fire_tx: mpsc::Sender<Fire>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let schedule = match CronSchedule::from_str(&self.cron_expression) {
                Ok(s) => s,
                Err(_) => return,
            };
            loop {
                let Some(next) = schedule.upcoming(self.timezone).take(1).next() else {
                    return;
                };
                let now = Utc::now().with_timezone(&self.timezone);
                let until_next = (next - now).to_std().unwrap_or_default();
                tokio::time::sleep(until_next).await;

                let mut ctx = ExecutionContext::new();
                ctx.trigger_payload = Some(self.payload.clone());
                let sent = fire_tx
                    .send(Fire {
                        rule_id,
                        context: ctx,
                        triggered_by: "scheduled".to_string(),
                    })
                    .await;
                if sent.is_err() {
                    return;
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
