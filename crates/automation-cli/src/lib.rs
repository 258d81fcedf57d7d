//! Command-line client for the tracker automation engine (§6 "CLI surface").
//!
//! This is a thin HTTP client over `automation-api`'s router — it carries no
//! engine state of its own. Two subcommand groups: `rule` (`create`,
//! `update`, `delete`, `list`, `execute`) and `integration` (`register`,
//! `test`). Exit codes: `0` success, `2` validation error, `3` not-found,
//! `4` permission, `1` otherwise.

use automation_core::{BulkOperationId, ExecutionId, IntegrationId, RuleId};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "automation-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Command-line client for the tracker automation engine")]
pub struct Cli {
    /// Base URL of the automation-api HTTP service
    #[arg(long, env = "AUTOMATION_API_URL", default_value = "http://127.0.0.1:8080")]
    pub api_url: String,

    /// Principal id sent as `X-Principal-Id` for permission gating
    #[arg(long, env = "AUTOMATION_PRINCIPAL_ID", default_value = "cli")]
    pub principal: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rule CRUD and execution
    Rule {
        #[command(subcommand)]
        action: RuleCommands,
    },
    /// Outbound webhook integration management
    Integration {
        #[command(subcommand)]
        action: IntegrationCommands,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum RuleCommands {
    /// Create a rule from a JSON or YAML spec file
    Create {
        /// Path to a RuleSpec document (JSON or YAML, by extension)
        file: PathBuf,
    },
    /// Apply a patch document to an existing rule
    Update {
        id: RuleId,
        /// Path to a RulePatch document
        file: PathBuf,
    },
    /// Delete a rule
    Delete { id: RuleId },
    /// List rules
    List {
        #[arg(long)]
        project_key: Option<String>,
        #[arg(long)]
        enabled_only: bool,
    },
    /// Fetch a single rule
    Get { id: RuleId },
    /// Validate a spec without persisting it
    Validate {
        file: PathBuf,
    },
    /// Manually invoke a rule's execution pipeline
    Execute {
        id: RuleId,
        /// Path to an ExecutionContext document; omit for an empty context
        #[arg(long)]
        context: Option<PathBuf>,
    },
    /// List executions
    Executions {
        #[arg(long)]
        rule_id: Option<RuleId>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Fetch aggregate metrics, optionally scoped to one rule
    Metrics {
        #[arg(long)]
        rule_id: Option<RuleId>,
    },
    /// Fetch a bulk-operation's progress
    BulkProgress { id: BulkOperationId },
}

#[derive(Subcommand)]
pub enum IntegrationCommands {
    /// Register a new outbound webhook integration
    Register {
        /// Path to a WebhookIntegrationSpec document
        file: PathBuf,
    },
    /// Send a test delivery to a registered integration
    Test { id: IntegrationId },
    /// Remove a registered integration
    Delete { id: IntegrationId },
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path} as {format}: {source}")]
    ParseFile {
        path: PathBuf,
        format: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{category}: {message}")]
    Api {
        category: String,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("failed to render output: {0}")]
    Render(#[from] serde_yaml::Error),
}

impl CliError {
    /// Exit code per spec §6: `0` success, `2` validation, `3` not-found,
    /// `4` permission, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Api { category, .. } => match category.as_str() {
                "validation" => 2,
                "not_found" => 3,
                "permission" => 4,
                _ => 1,
            },
            _ => 1,
        }
    }
}

// ============================================================================
// HTTP client
// ============================================================================

/// Thin wrapper around `reqwest` carrying the base URL and principal header
/// every request needs.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    principal: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    category: String,
    message: String,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

impl ApiClient {
    pub fn new(base_url: String, principal: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            principal,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, CliError> {
        let response = builder.header("X-Principal-Id", &self.principal).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let body: ApiErrorBody = response
            .json()
            .await
            .unwrap_or_else(|_| ApiErrorBody {
                category: "internal".to_string(),
                message: "request failed with no decodable body".to_string(),
                details: None,
            });
        Err(CliError::Api {
            category: body.category,
            message: body.message,
            details: body.details,
        })
    }

    pub async fn create_rule(&self, spec: serde_json::Value) -> Result<serde_json::Value, CliError> {
        let resp = self
            .send(self.http.post(self.url("/rules")).json(&spec))
            .await?;
        Ok(resp.json().await?)
    }

    pub async fn update_rule(&self, id: RuleId, patch: serde_json::Value) -> Result<serde_json::Value, CliError> {
        let resp = self
            .send(self.http.put(self.url(&format!("/rules/{id}"))).json(&patch))
            .await?;
        Ok(resp.json().await?)
    }

    pub async fn delete_rule(&self, id: RuleId) -> Result<(), CliError> {
        self.send(self.http.delete(self.url(&format!("/rules/{id}")))).await?;
        Ok(())
    }

    pub async fn get_rule(&self, id: RuleId) -> Result<serde_json::Value, CliError> {
        let resp = self.send(self.http.get(self.url(&format!("/rules/{id}")))).await?;
        Ok(resp.json().await?)
    }

    pub async fn list_rules(
        &self,
        project_key: Option<&str>,
        enabled_only: bool,
    ) -> Result<serde_json::Value, CliError> {
        let mut req = self.http.get(self.url("/rules"));
        if let Some(pk) = project_key {
            req = req.query(&[("project_key", pk)]);
        }
        if enabled_only {
            req = req.query(&[("enabled_only", "true")]);
        }
        let resp = self.send(req).await?;
        Ok(resp.json().await?)
    }

    pub async fn validate_rule(&self, spec: serde_json::Value) -> Result<serde_json::Value, CliError> {
        let resp = self
            .send(self.http.post(self.url("/rules/validate")).json(&spec))
            .await?;
        Ok(resp.json().await?)
    }

    pub async fn execute_rule(&self, id: RuleId, ctx: serde_json::Value) -> Result<serde_json::Value, CliError> {
        let resp = self
            .send(self.http.post(self.url(&format!("/rules/{id}/execute"))).json(&ctx))
            .await?;
        Ok(resp.json().await?)
    }

    pub async fn list_executions(
        &self,
        rule_id: Option<RuleId>,
        limit: Option<usize>,
    ) -> Result<serde_json::Value, CliError> {
        let mut req = self.http.get(self.url("/executions"));
        if let Some(id) = rule_id {
            req = req.query(&[("rule_id", id.to_string())]);
        }
        if let Some(limit) = limit {
            req = req.query(&[("limit", limit.to_string())]);
        }
        let resp = self.send(req).await?;
        Ok(resp.json().await?)
    }

    pub async fn get_metrics(&self, rule_id: Option<RuleId>) -> Result<serde_json::Value, CliError> {
        let path = match rule_id {
            Some(id) => format!("/metrics/{id}"),
            None => "/metrics".to_string(),
        };
        let resp = self.send(self.http.get(self.url(&path))).await?;
        Ok(resp.json().await?)
    }

    pub async fn get_bulk_progress(&self, id: BulkOperationId) -> Result<serde_json::Value, CliError> {
        let resp = self
            .send(self.http.get(self.url(&format!("/bulk-operations/{id}"))))
            .await?;
        Ok(resp.json().await?)
    }

    pub async fn register_integration(&self, spec: serde_json::Value) -> Result<serde_json::Value, CliError> {
        let resp = self
            .send(self.http.post(self.url("/integrations")).json(&spec))
            .await?;
        Ok(resp.json().await?)
    }

    pub async fn test_integration(&self, id: IntegrationId) -> Result<serde_json::Value, CliError> {
        let resp = self
            .send(self.http.post(self.url(&format!("/integrations/{id}/test"))))
            .await?;
        Ok(resp.json().await?)
    }

    pub async fn delete_integration(&self, id: IntegrationId) -> Result<(), CliError> {
        self.send(self.http.delete(self.url(&format!("/integrations/{id}"))))
            .await?;
        Ok(())
    }
}

// ============================================================================
// File IO helpers
// ============================================================================

fn read_document(path: &PathBuf) -> Result<serde_json::Value, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::ReadFile {
        path: path.clone(),
        source,
    })?;
    let is_json = matches!(path.extension().and_then(|e| e.to_str()), Some("json"));
    if is_json {
        serde_json::from_str(&raw).map_err(|e| CliError::ParseFile {
            path: path.clone(),
            format: "json",
            source: e.into(),
        })
    } else {
        serde_yaml::from_str(&raw).map_err(|e| CliError::ParseFile {
            path: path.clone(),
            format: "yaml",
            source: e.into(),
        })
    }
}

// ============================================================================
// Output rendering
// ============================================================================

fn render(value: &serde_json::Value, format: &OutputFormat) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).unwrap_or_default(),
        OutputFormat::Yaml | OutputFormat::Text => serde_yaml::to_string(value)?,
    })
}

// ============================================================================
// Entry point
// ============================================================================

pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    let client = ApiClient::new(cli.api_url.clone(), cli.principal.clone());

    let output = match cli.command {
        Commands::Rule { action } => run_rule_command(&client, action).await?,
        Commands::Integration { action } => run_integration_command(&client, action).await?,
        Commands::Completions { shell } => {
            print_completions(shell);
            return Ok(());
        }
    };

    if let Some(value) = output {
        println!("{}", render(&value, &cli.format)?);
    }
    Ok(())
}

async fn run_rule_command(
    client: &ApiClient,
    action: RuleCommands,
) -> Result<Option<serde_json::Value>, CliError> {
    Ok(match action {
        RuleCommands::Create { file } => {
            let spec = read_document(&file)?;
            debug!(?file, "creating rule");
            Some(client.create_rule(spec).await?)
        }
        RuleCommands::Update { id, file } => {
            let patch = read_document(&file)?;
            Some(client.update_rule(id, patch).await?)
        }
        RuleCommands::Delete { id } => {
            client.delete_rule(id).await?;
            None
        }
        RuleCommands::List { project_key, enabled_only } => {
            Some(client.list_rules(project_key.as_deref(), enabled_only).await?)
        }
        RuleCommands::Get { id } => Some(client.get_rule(id).await?),
        RuleCommands::Validate { file } => {
            let spec = read_document(&file)?;
            Some(client.validate_rule(spec).await?)
        }
        RuleCommands::Execute { id, context } => {
            let ctx = match context {
                Some(path) => read_document(&path)?,
                None => serde_json::json!({ "custom": {} }),
            };
            Some(client.execute_rule(id, ctx).await?)
        }
        RuleCommands::Executions { rule_id, limit } => Some(client.list_executions(rule_id, limit).await?),
        RuleCommands::Metrics { rule_id } => Some(client.get_metrics(rule_id).await?),
        RuleCommands::BulkProgress { id } => Some(client.get_bulk_progress(id).await?),
    })
}

async fn run_integration_command(
    client: &ApiClient,
    action: IntegrationCommands,
) -> Result<Option<serde_json::Value>, CliError> {
    Ok(match action {
        IntegrationCommands::Register { file } => {
            let spec = read_document(&file)?;
            Some(client.register_integration(spec).await?)
        }
        IntegrationCommands::Test { id } => Some(client.test_integration(id).await?),
        IntegrationCommands::Delete { id } => {
            client.delete_integration(id).await?;
            None
        }
    })
}

fn print_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
