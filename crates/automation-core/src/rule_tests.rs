use super::*;
use serde_json::json;

fn minimal_spec() -> RuleSpec {
    RuleSpec {
        name: "Welcome comment".into(),
        description: None,
        enabled: true,
        project_scope: Default::default(),
        triggers: vec![Trigger {
            trigger_type: TriggerType::IssueCreated,
            config: json!({}),
        }],
        conditions: vec![],
        actions: vec![Action {
            action_type: ActionType::AddComment,
            config: json!({"body": "Welcome"}),
            order: 0,
            continue_on_error: false,
        }],
        created_by: "alice".into(),
    }
}

#[test]
fn valid_spec_passes_validation() {
    assert!(validate_spec(&minimal_spec()).is_ok());
}

#[test]
fn empty_name_is_rejected() {
    let mut spec = minimal_spec();
    spec.name = "  ".into();
    let errors = validate_spec(&spec).unwrap_err();
    assert!(errors.iter().any(|e| e.field == "name"));
}

#[test]
fn zero_triggers_or_actions_rejected() {
    let mut spec = minimal_spec();
    spec.triggers.clear();
    spec.actions.clear();
    let errors = validate_spec(&spec).unwrap_err();
    assert!(errors.iter().any(|e| e.field == "triggers"));
    assert!(errors.iter().any(|e| e.field == "actions"));
}

#[test]
fn scheduled_trigger_requires_cron_and_timezone() {
    let mut spec = minimal_spec();
    spec.triggers = vec![Trigger {
        trigger_type: TriggerType::Scheduled,
        config: json!({}),
    }];
    let errors = validate_spec(&spec).unwrap_err();
    assert!(errors.iter().any(|e| e.field == "triggers[0]"));
}

#[test]
fn first_condition_must_not_have_combinator() {
    let mut spec = minimal_spec();
    spec.conditions = vec![Condition {
        condition_type: ConditionType::IssueAge,
        config: json!({"days": 3}),
        combinator: Some(Combinator::And),
    }];
    let errors = validate_spec(&spec).unwrap_err();
    assert!(errors.iter().any(|e| e.field == "conditions[0].combinator"));
}

#[test]
fn subsequent_condition_requires_combinator() {
    let mut spec = minimal_spec();
    spec.conditions = vec![
        Condition {
            condition_type: ConditionType::IssueAge,
            config: json!({"days": 3}),
            combinator: None,
        },
        Condition {
            condition_type: ConditionType::FieldValue,
            config: json!({}),
            combinator: None,
        },
    ];
    let errors = validate_spec(&spec).unwrap_err();
    assert!(errors.iter().any(|e| e.field == "conditions[1].combinator"));
}

#[test]
fn custom_script_condition_is_rejected_at_validation() {
    let mut spec = minimal_spec();
    spec.conditions = vec![Condition {
        condition_type: ConditionType::CustomScript,
        config: json!({}),
        combinator: None,
    }];
    let errors = validate_spec(&spec).unwrap_err();
    assert!(errors.iter().any(|e| e.code == "not_implemented"));
}

#[test]
fn duplicate_action_order_is_rejected() {
    let mut spec = minimal_spec();
    spec.actions.push(Action {
        action_type: ActionType::AddComment,
        config: json!({"body": "x"}),
        order: 0,
        continue_on_error: false,
    });
    let errors = validate_spec(&spec).unwrap_err();
    assert!(errors.iter().any(|e| e.code == "duplicate"));
}

#[test]
fn transition_action_requires_id_or_name() {
    let mut spec = minimal_spec();
    spec.actions = vec![Action {
        action_type: ActionType::TransitionIssue,
        config: json!({}),
        order: 0,
        continue_on_error: false,
    }];
    assert!(validate_spec(&spec).is_err());
}

#[test]
fn success_rate_uses_count_minus_failures_over_count() {
    let mut rule = Rule::from_spec(minimal_spec());
    rule.execution_count = 10;
    rule.failure_count = 3;
    assert!((rule.success_rate() - 70.0).abs() < f64::EPSILON);
}

#[test]
fn success_rate_is_100_with_no_executions() {
    let rule = Rule::from_spec(minimal_spec());
    assert_eq!(rule.success_rate(), 100.0);
}

#[test]
fn apply_patch_leaves_id_immutable_and_bumps_updated_at() {
    let mut rule = Rule::from_spec(minimal_spec());
    let id_before = rule.id;
    let created_at_before = rule.created_at;
    std::thread::sleep(std::time::Duration::from_millis(2));

    rule.apply_patch(RulePatch {
        name: Some("Renamed".into()),
        ..Default::default()
    });

    assert_eq!(rule.id, id_before);
    assert_eq!(rule.created_at, created_at_before);
    assert_eq!(rule.name, "Renamed");
    assert!(rule.updated_at >= rule.created_at);
}

#[test]
fn patch_changes_bindings_when_enabled_or_triggers_present() {
    let rule = Rule::from_spec(minimal_spec());
    assert!(rule.patch_changes_bindings(&RulePatch {
        enabled: Some(false),
        ..Default::default()
    }));
    assert!(!rule.patch_changes_bindings(&RulePatch {
        name: Some("x".into()),
        ..Default::default()
    }));
}
