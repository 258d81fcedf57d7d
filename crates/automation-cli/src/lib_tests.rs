//! Tests for the automation-cli argument parsing and HTTP client.

use super::*;
use automation_core::RuleId;
use clap::Parser;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn parses_rule_create() {
    let cli = Cli::try_parse_from(["automation-cli", "rule", "create", "spec.json"]).unwrap();
    match cli.command {
        Commands::Rule {
            action: RuleCommands::Create { file },
        } => assert_eq!(file, PathBuf::from("spec.json")),
        _ => panic!("expected Rule::Create"),
    }
}

#[test]
fn parses_integration_test() {
    let id = RuleId::new().to_string();
    let cli = Cli::try_parse_from(["automation-cli", "integration", "test", &id]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Integration {
            action: IntegrationCommands::Test { .. }
        }
    ));
}

#[test]
fn default_api_url_and_format() {
    let cli = Cli::try_parse_from(["automation-cli", "rule", "list"]).unwrap();
    assert_eq!(cli.api_url, "http://127.0.0.1:8080");
    assert_eq!(cli.format, OutputFormat::Text);
}

#[test]
fn exit_code_maps_api_categories() {
    let not_found = CliError::Api {
        category: "not_found".to_string(),
        message: "rule X not found".to_string(),
        details: None,
    };
    assert_eq!(not_found.exit_code(), 3);

    let permission = CliError::Api {
        category: "permission".to_string(),
        message: "denied".to_string(),
        details: None,
    };
    assert_eq!(permission.exit_code(), 4);

    let validation = CliError::Api {
        category: "validation".to_string(),
        message: "bad input".to_string(),
        details: None,
    };
    assert_eq!(validation.exit_code(), 2);

    let internal = CliError::Api {
        category: "internal".to_string(),
        message: "oops".to_string(),
        details: None,
    };
    assert_eq!(internal.exit_code(), 1);
}

#[tokio::test]
async fn list_rules_hits_expected_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), "cli".to_string());
    let result = client.list_rules(None, false).await.unwrap();
    assert_eq!(result, serde_json::json!([]));
}

#[tokio::test]
async fn error_response_maps_to_api_error_with_category() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rules/does-not-exist"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "category": "not_found",
            "code": "not_found",
            "message": "rule does-not-exist not found",
            "details": null,
        })))
        .mount(&server)
        .await;

    let client = ApiClient::new(server.uri(), "cli".to_string());
    let err = client
        .send(client.http.get(client.url("/rules/does-not-exist")))
        .await
        .unwrap_err();
    match err {
        CliError::Api { category, .. } => assert_eq!(category, "not_found"),
        other => panic!("expected Api error, got {other:?}"),
    }
}
