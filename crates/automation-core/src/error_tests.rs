use super::*;

#[test]
fn category_maps_each_variant() {
    assert_eq!(
        AutomationError::validation(vec![]).category(),
        ErrorCategory::Validation
    );
    assert_eq!(
        AutomationError::not_found("rule", "r1").category(),
        ErrorCategory::NotFound
    );
    assert_eq!(
        AutomationError::Permission { reason: "no".into() }.category(),
        ErrorCategory::Permission
    );
    assert_eq!(
        AutomationError::RateLimit { retry_after_ms: 10 }.category(),
        ErrorCategory::RateLimit
    );
    assert_eq!(
        AutomationError::Execution { message: "x".into() }.category(),
        ErrorCategory::Execution
    );
    assert_eq!(
        AutomationError::Configuration { message: "x".into() }.category(),
        ErrorCategory::Configuration
    );
    assert_eq!(
        AutomationError::Internal { message: "x".into() }.category(),
        ErrorCategory::Internal
    );
}

#[test]
fn tracker_error_category_passthrough() {
    let api_err = tracker_client::ApiError::Http {
        status: 404,
        message: "missing".into(),
        category: tracker_client::ErrorCategory::NotFound,
        retry_after_ms: None,
    };
    let err: AutomationError = api_err.into();
    assert_eq!(err.category(), ErrorCategory::NotFound);
}

#[test]
fn field_error_display() {
    let fe = FieldError::new("name", "required", "name must not be empty");
    assert_eq!(fe.to_string(), "name: name must not be empty");
}

#[test]
fn not_found_helper_fills_resource_and_id() {
    match AutomationError::not_found("rule", "abc") {
        AutomationError::NotFound { resource, id } => {
            assert_eq!(resource, "rule");
            assert_eq!(id, "abc");
        }
        _ => panic!("expected NotFound"),
    }
}
