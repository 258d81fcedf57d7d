use super::*;
use serde_json::json;

fn scheduled_trigger(cron: &str, tz: &str) -> Trigger {
    Trigger {
        trigger_type: crate::model::TriggerType::Scheduled,
        config: json!({"cron_expression": cron, "timezone": tz}),
    }
}

#[test]
fn parse_returns_none_for_non_scheduled_trigger() {
    let trigger = Trigger {
        trigger_type: crate::model::TriggerType::Manual,
        config: json!({}),
    };
    assert!(parse(&trigger).is_none());
}

#[test]
fn parse_accepts_valid_cron_and_timezone() {
    let trigger = scheduled_trigger("0 0 * * * *", "UTC");
    assert!(parse(&trigger).is_some());
}

#[test]
fn parse_rejects_invalid_cron_expression() {
    let trigger = scheduled_trigger("not a cron expr", "UTC");
    assert!(parse(&trigger).is_none());
}

#[test]
fn parse_rejects_unknown_timezone() {
    let trigger = scheduled_trigger("0 0 * * * *", "Not/A_Zone");
    assert!(parse(&trigger).is_none());
}

#[tokio::test]
async fn spawn_fires_on_tick() {
    // Every-second cron so the test completes quickly.
    let trigger = scheduled_trigger("* * * * * *", "UTC");
    let parsed = parse(&trigger).unwrap();
    let (tx, mut rx) = mpsc::channel(4);
    let rule_id = RuleId::new();
    let handle = parsed.spawn(rule_id, tx);

    let fire = tokio::time::timeout(std::time::Duration::from_secs(3), rx.recv())
        .await
        .expect("should fire within 3s")
        .expect("channel open");
    assert_eq!(fire.rule_id, rule_id);
    assert_eq!(fire.triggered_by, "scheduled");
    assert!(fire.context.issue_key.is_none());

    handle.abort();
}
