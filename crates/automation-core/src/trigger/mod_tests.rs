use super::*;
use crate::model::TriggerType;
use crate::rule::Trigger;
use serde_json::json;

fn manager() -> (TriggerManager, mpsc::Receiver<Fire>) {
    let (tx, rx) = mpsc::channel(16);
    (TriggerManager::new(tx), rx)
}

#[tokio::test]
async fn event_trigger_fires_on_matching_event() {
    let (manager, mut rx) = manager();
    let rule_id = RuleId::new();
    let triggers = vec![Trigger {
        trigger_type: TriggerType::IssueCreated,
        config: json!({"project_keys": ["ACME"]}),
    }];
    manager.bind_rule(rule_id, &triggers).await;

    let event = events::IssueEvent::new(
        events::IssueEventKind::IssueCreated,
        json!({"key": "ACME-1", "fields": {"project": {"key": "ACME"}}}),
    );
    manager.handle_event(event).await;

    let fire = rx.recv().await.unwrap();
    assert_eq!(fire.rule_id, rule_id);
    assert_eq!(fire.triggered_by, "event");
}

#[tokio::test]
async fn non_matching_event_does_not_fire() {
    let (manager, mut rx) = manager();
    let rule_id = RuleId::new();
    let triggers = vec![Trigger {
        trigger_type: TriggerType::IssueCreated,
        config: json!({"project_keys": ["ACME"]}),
    }];
    manager.bind_rule(rule_id, &triggers).await;

    let event = events::IssueEvent::new(
        events::IssueEventKind::IssueCreated,
        json!({"key": "OTHER-1", "fields": {"project": {"key": "OTHER"}}}),
    );
    manager.handle_event(event).await;

    let result = tokio::time::timeout(std::time::Duration::from_millis(50), rx.recv()).await;
    assert!(result.is_err(), "no fire should have been sent");
}

#[tokio::test]
async fn unbind_rule_removes_event_and_inlet_registrations() {
    let (manager, mut rx) = manager();
    let rule_id = RuleId::new();
    let triggers = vec![
        Trigger {
            trigger_type: TriggerType::IssueCreated,
            config: json!({}),
        },
        Trigger {
            trigger_type: TriggerType::Webhook,
            config: json!({"inlet_id": "in-1"}),
        },
    ];
    manager.bind_rule(rule_id, &triggers).await;
    manager.unbind_rule(rule_id).await;

    let event = events::IssueEvent::new(events::IssueEventKind::IssueCreated, json!({"key": "A-1"}));
    manager.handle_event(event).await;
    assert!(tokio::time::timeout(std::time::Duration::from_millis(50), rx.recv())
        .await
        .is_err());

    assert!(manager.handle_webhook("in-1", "{}", None, json!({})).await);
    assert!(tokio::time::timeout(std::time::Duration::from_millis(50), rx.recv())
        .await
        .is_err());
}

#[tokio::test]
async fn webhook_inlet_fires_all_bound_rules() {
    let (manager, mut rx) = manager();
    let rule_a = RuleId::new();
    let rule_b = RuleId::new();
    let trigger = vec![Trigger {
        trigger_type: TriggerType::Webhook,
        config: json!({"inlet_id": "shared"}),
    }];
    manager.bind_rule(rule_a, &trigger).await;
    manager.bind_rule(rule_b, &trigger).await;

    let verified = manager.handle_webhook("shared", "{}", None, json!({"x": 1})).await;
    assert!(verified);

    let mut seen = std::collections::HashSet::new();
    for _ in 0..2 {
        let fire = rx.recv().await.unwrap();
        assert_eq!(fire.triggered_by, "webhook");
        seen.insert(fire.rule_id);
    }
    assert!(seen.contains(&rule_a));
    assert!(seen.contains(&rule_b));
}

#[tokio::test]
async fn webhook_inlet_with_secret_rejects_bad_signature() {
    let (manager, mut rx) = manager();
    let rule_id = RuleId::new();
    let trigger = vec![Trigger {
        trigger_type: TriggerType::Webhook,
        config: json!({"inlet_id": "secured", "secret": "shh"}),
    }];
    manager.bind_rule(rule_id, &trigger).await;

    let body = "{}";
    let bad = manager.handle_webhook("secured", body, Some("sha256=bad"), json!({})).await;
    assert!(!bad);
    assert!(tokio::time::timeout(std::time::Duration::from_millis(50), rx.recv())
        .await
        .is_err());

    let good_sig = crate::webhook::signature::sign(body, "shh");
    let good = manager.handle_webhook("secured", body, Some(&good_sig), json!({})).await;
    assert!(good);
    rx.recv().await.unwrap();
}

#[tokio::test]
async fn shutdown_aborts_scheduled_timers() {
    let (manager, _rx) = manager();
    let rule_id = RuleId::new();
    let triggers = vec![Trigger {
        trigger_type: TriggerType::Scheduled,
        config: json!({"cron_expression": "* * * * * *", "timezone": "UTC"}),
    }];
    manager.bind_rule(rule_id, &triggers).await;
    manager.shutdown().await;
    assert!(manager.schedules.read().await.is_empty());
}
