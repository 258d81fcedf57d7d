use super::*;
use std::str::FromStr;

#[test]
fn rule_ids_are_unique_and_roundtrip_through_display() {
    let a = RuleId::new();
    let b = RuleId::new();
    assert_ne!(a, b);
    let parsed = RuleId::from_str(&a.to_string()).unwrap();
    assert_eq!(a, parsed);
}

#[test]
fn rule_ids_sort_lexicographically_with_creation_order() {
    let a = RuleId::new();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let b = RuleId::new();
    assert!(a.to_string() < b.to_string());
}

#[test]
fn principal_id_from_str_and_string() {
    let a: PrincipalId = "alice".into();
    let b: PrincipalId = String::from("alice").into();
    assert_eq!(a, b);
    assert_eq!(a.as_str(), "alice");
}

#[test]
fn action_type_serializes_kebab_case() {
    let json = serde_json::to_string(&ActionType::UpdateCustomField).unwrap();
    assert_eq!(json, "\"update-custom-field\"");
    assert_eq!(ActionType::UpdateCustomField.to_string(), "update-custom-field");
}

#[test]
fn execution_status_terminal_classification() {
    assert!(!ExecutionStatus::Pending.is_terminal());
    assert!(!ExecutionStatus::Running.is_terminal());
    assert!(ExecutionStatus::Completed.is_terminal());
    assert!(ExecutionStatus::Failed.is_terminal());
    assert!(ExecutionStatus::Cancelled.is_terminal());
}

#[test]
fn trigger_type_serializes_screaming_snake_case() {
    let json = serde_json::to_string(&TriggerType::FieldChanged).unwrap();
    assert_eq!(json, "\"FIELD_CHANGED\"");
}
