use super::*;
use serde_json::json;

fn ctx_with_issue() -> ExecutionContext {
    let mut ctx = ExecutionContext::new().with_issue_key("ACME-7").with_project_key("ACME");
    ctx.issue_payload = Some(json!({"fields": {"summary": "Build the widget"}}));
    ctx
}

#[test]
fn resolves_single_placeholder() {
    let ctx = ctx_with_issue();
    assert_eq!(resolve_string("Issue {issue_key}", &ctx), "Issue ACME-7");
}

#[test]
fn resolves_multiple_placeholders_in_one_string() {
    let ctx = ctx_with_issue();
    assert_eq!(
        resolve_string("{project_key}/{issue_key}: {issue.fields.summary}", &ctx),
        "ACME/ACME-7: Build the widget"
    );
}

#[test]
fn missing_path_expands_to_empty_string() {
    let ctx = ctx_with_issue();
    assert_eq!(resolve_string("value={issue.fields.missing}", &ctx), "value=");
}

#[test]
fn non_string_config_values_are_untouched() {
    let ctx = ctx_with_issue();
    let config = json!({
        "summary": "{issue.fields.summary}",
        "count": 3,
        "enabled": true,
        "nested": {"body": "{issue_key}"},
        "list": ["{project_key}", 2],
    });
    let resolved = resolve_config(&config, &ctx);
    assert_eq!(resolved["summary"], "Build the widget");
    assert_eq!(resolved["count"], 3);
    assert_eq!(resolved["enabled"], true);
    assert_eq!(resolved["nested"]["body"], "ACME-7");
    assert_eq!(resolved["list"][0], "ACME");
    assert_eq!(resolved["list"][1], 2);
}

#[test]
fn expansion_is_single_pass_and_idempotent() {
    let mut ctx = ExecutionContext::new();
    ctx.custom.insert("a".into(), json!("{b}"));
    ctx.custom.insert("b".into(), json!("shouldnotexpand"));

    let once = resolve_string("{a}", &ctx);
    assert_eq!(once, "{b}");

    // Re-resolving the already-resolved output (idempotence, invariant 9)
    // must not expand the literal "{b}" that fell out of the first pass.
    let twice = resolve_string(&once, &ctx);
    assert_eq!(twice, "shouldnotexpand");
    assert_ne!(once, twice, "first pass must not itself have expanded {{b}}");
}

#[test]
fn resolve_truthy_empty_is_false() {
    let ctx = ExecutionContext::new();
    assert!(!resolve_truthy("{missing}", &ctx));
}

#[test]
fn resolve_truthy_non_empty_is_true() {
    let ctx = ctx_with_issue();
    assert!(resolve_truthy("{issue_key}", &ctx));
}

#[test]
fn resolve_truthy_literal_false_string_is_false() {
    let mut ctx = ExecutionContext::new();
    ctx.custom.insert("flag".into(), json!("false"));
    assert!(!resolve_truthy("{flag}", &ctx));
}
