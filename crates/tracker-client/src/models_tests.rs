use super::*;
use serde_json::json;

fn sample_issue() -> Issue {
    let mut fields = serde_json::Map::new();
    fields.insert(
        "project".into(),
        json!({"key": "ACME", "categoryId": "10"}),
    );
    fields.insert("issuetype".into(), json!({"name": "Task"}));
    fields.insert("summary".into(), json!("Do the thing"));
    Issue {
        id: "1001".into(),
        key: "ACME-7".into(),
        fields,
        created: Utc::now(),
        updated: Utc::now(),
    }
}

#[test]
fn field_path_resolves_nested_dotted_path() {
    let issue = sample_issue();
    assert_eq!(
        issue.field_path("project.key").and_then(|v| v.as_str()),
        Some("ACME")
    );
}

#[test]
fn field_path_missing_segment_returns_none() {
    let issue = sample_issue();
    assert!(issue.field_path("project.missing").is_none());
    assert!(issue.field_path("nope").is_none());
}

#[test]
fn project_key_and_issue_type_helpers() {
    let issue = sample_issue();
    assert_eq!(issue.project_key(), Some("ACME"));
    assert_eq!(issue.issue_type(), Some("Task"));
}

#[test]
fn field_type_compression_covers_common_custom_types() {
    assert_eq!(
        FieldType::compress("com.tracker:datetime"),
        FieldType::DateTime
    );
    assert_eq!(FieldType::compress("com.tracker:duedate"), FieldType::Date);
    assert_eq!(
        FieldType::compress("com.tracker:float"),
        FieldType::Number
    );
    assert_eq!(
        FieldType::compress("com.tracker:multiuserpicker"),
        FieldType::Array
    );
    assert_eq!(
        FieldType::compress("com.tracker:select"),
        FieldType::Option
    );
    assert_eq!(
        FieldType::compress("com.tracker:textfield"),
        FieldType::String
    );
}
