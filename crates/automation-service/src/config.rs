//! Layered service configuration (§4.0.2 / §6): programmatic defaults,
//! an optional `config.toml`, then environment variables, all merged
//! through the `config` crate's layered providers. Every key is
//! range-validated here so a bad value is a startup error, never a
//! runtime surprise.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracker_client::AuthMethod;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("TRACKER_BASE_URL is required")]
    MissingBaseUrl,
    #[error("either TRACKER_EMAIL + TRACKER_API_TOKEN, or TRACKER_OAUTH_TOKEN, must be set")]
    MissingAuth,
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("LOG_LEVEL must be one of trace, debug, info, warn, error, fatal; got '{0}'")]
    InvalidLogLevel(String),
}

/// Wire shape for the layered sources; every field has a programmatic
/// default so a source only needs to supply what it overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawServiceConfig {
    server_host: String,
    server_port: u16,
    tracker_base_url: Option<String>,
    tracker_email: Option<String>,
    tracker_api_token: Option<String>,
    tracker_oauth_token: Option<String>,
    request_timeout_ms: u64,
    max_retries: u32,
    retry_delay_ms: u64,
    retention_days: i64,
    max_concurrent_executions: usize,
    execution_timeout_ms: u64,
    audit_dir: String,
    audit_enabled: bool,
    log_level: String,
}

impl Default for RawServiceConfig {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            tracker_base_url: None,
            tracker_email: None,
            tracker_api_token: None,
            tracker_oauth_token: None,
            request_timeout_ms: 30_000,
            max_retries: 3,
            retry_delay_ms: 1_000,
            retention_days: 30,
            max_concurrent_executions: 10,
            execution_timeout_ms: 300_000,
            audit_dir: "./logs/audit".to_string(),
            audit_enabled: true,
            log_level: "info".to_string(),
        }
    }
}

/// Validated, ready-to-use service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub server_host: String,
    pub server_port: u16,
    pub tracker_base_url: String,
    pub tracker_auth: AuthMethod,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub retention_days: i64,
    pub max_concurrent_executions: usize,
    pub execution_timeout: Duration,
    pub audit_dir: PathBuf,
    pub audit_enabled: bool,
    pub log_level: String,
}

impl ServiceConfig {
    /// Load from `./config.toml` (if present) layered under environment
    /// variables, the path `main` uses at startup.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Some("config.toml"))
    }

    /// Load with an explicit (or absent) config file, for tests.
    pub fn load_from(file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&RawServiceConfig::default())?);
        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let raw: RawServiceConfig = builder
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()?;
        Self::validate(raw)
    }

    fn validate(raw: RawServiceConfig) -> Result<Self, ConfigError> {
        let tracker_base_url = raw
            .tracker_base_url
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?;

        let tracker_auth = match (raw.tracker_oauth_token, raw.tracker_email, raw.tracker_api_token) {
            (Some(token), _, _) if !token.is_empty() => AuthMethod::OAuthBearer { token },
            (_, Some(email), Some(api_token)) if !email.is_empty() && !api_token.is_empty() => {
                AuthMethod::BasicToken { email, api_token }
            }
            _ => return Err(ConfigError::MissingAuth),
        };

        in_range("REQUEST_TIMEOUT_MS", raw.request_timeout_ms as i64, 1_000, 300_000)?;
        in_range("MAX_RETRIES", raw.max_retries as i64, 0, 10)?;
        in_range("RETRY_DELAY_MS", raw.retry_delay_ms as i64, 100, 10_000)?;

        const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "fatal"];
        if !VALID_LOG_LEVELS.contains(&raw.log_level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(raw.log_level));
        }

        Ok(Self {
            server_host: raw.server_host,
            server_port: raw.server_port,
            tracker_base_url,
            tracker_auth,
            request_timeout: Duration::from_millis(raw.request_timeout_ms),
            max_retries: raw.max_retries,
            retry_delay: Duration::from_millis(raw.retry_delay_ms),
            retention_days: raw.retention_days,
            max_concurrent_executions: raw.max_concurrent_executions,
            execution_timeout: Duration::from_millis(raw.execution_timeout_ms),
            audit_dir: PathBuf::from(raw.audit_dir),
            audit_enabled: raw.audit_enabled,
            log_level: raw.log_level,
        })
    }
}

fn in_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange { field, value, min, max });
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
