//! Client configuration: authentication, timeouts, retry knobs.
//!
//! Mirrors the environment-driven configuration keys the automation service
//! reads at startup (`TRACKER_BASE_URL`, `TRACKER_EMAIL`/`TRACKER_API_TOKEN`
//! or `TRACKER_OAUTH_TOKEN`, `REQUEST_TIMEOUT_MS`, `MAX_RETRIES`,
//! `RETRY_DELAY_MS`).

use std::time::Duration;

/// How the client authenticates against the tracker.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// HTTP basic auth with an account email and API token.
    BasicToken { email: String, api_token: String },
    /// Bearer OAuth access token.
    OAuthBearer { token: String },
}

/// Configuration for tracker API client behavior.
///
/// # Examples
///
/// ```
/// use tracker_client::{AuthMethod, ClientConfig};
/// use std::time::Duration;
///
/// let config = ClientConfig::builder()
///     .base_url("https://tracker.example.com")
///     .auth(AuthMethod::OAuthBearer { token: "tok".into() })
///     .timeout(Duration::from_secs(10))
///     .max_retries(3)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub auth: AuthMethod,
    pub user_agent: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }
}

/// Builder for constructing `ClientConfig` instances.
#[derive(Debug)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    auth: Option<AuthMethod>,
    user_agent: String,
    timeout: Duration,
    max_retries: u32,
    initial_retry_delay: Duration,
    max_retry_delay: Duration,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            auth: None,
            user_agent: concat!("tracker-automation-engine/", env!("CARGO_PKG_VERSION")).into(),
            timeout: Duration::from_millis(30_000),
            max_retries: 3,
            initial_retry_delay: Duration::from_millis(1_000),
            max_retry_delay: Duration::from_secs(10),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn auth(mut self, auth: AuthMethod) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn initial_retry_delay(mut self, delay: Duration) -> Self {
        self.initial_retry_delay = delay;
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    /// Build the configuration.
    ///
    /// # Panics
    ///
    /// Panics if `base_url` or `auth` were never set. Callers at the service
    /// boundary should validate configuration before this point (missing
    /// base URL or auth is a fatal configuration error per the engine's
    /// error-handling contract, not a panic path in request handling).
    pub fn build(self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.expect("base_url is required"),
            auth: self.auth.expect("auth is required"),
            user_agent: self.user_agent,
            timeout: self.timeout,
            max_retries: self.max_retries,
            initial_retry_delay: self.initial_retry_delay,
            max_retry_delay: self.max_retry_delay,
        }
    }

    /// Build the configuration, returning an error instead of panicking when
    /// required fields are missing. Used by the service's startup path.
    pub fn try_build(self) -> Result<ClientConfig, crate::error::ApiError> {
        let base_url = self
            .base_url
            .ok_or_else(|| crate::error::ApiError::Configuration("base_url is required".into()))?;
        let auth = self
            .auth
            .ok_or_else(|| crate::error::ApiError::Configuration("auth is required".into()))?;
        Ok(ClientConfig {
            base_url,
            auth,
            user_agent: self.user_agent,
            timeout: self.timeout,
            max_retries: self.max_retries,
            initial_retry_delay: self.initial_retry_delay,
            max_retry_delay: self.max_retry_delay,
        })
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
