//! The tracker API client.
//!
//! One `reqwest::Client` shared across calls, wrapped with retry/backoff for
//! transient failures and consistent error-category mapping so the Action
//! Executor never has to inspect raw HTTP status codes.

use crate::circuit_breaker::{
    tracker_circuit_breaker_config, CircuitBreaker, CircuitBreakerError, CircuitState, DefaultCircuitBreaker,
    DefaultCircuitBreakerFactory,
};
use crate::config::{AuthMethod, ClientConfig};
use crate::error::{ApiError, ErrorCategory};
use crate::models::{
    Comment, CreateIssueRequest, FieldSchema, FieldType, Group, Issue, IssueRef, Project,
    SearchResult, Transition, UpdateIssueRequest, User,
};
use crate::retry::RetryPolicy;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{instrument, warn};

/// Client for the tracker's REST API.
///
/// All methods retry transient failures (429 and 5xx) according to the
/// configured [`RetryPolicy`], honoring a `Retry-After` header when present.
/// Every call is additionally guarded by a circuit breaker
/// (`tracker_circuit_breaker_config`) that trips after a run of consecutive
/// failures so a persistently-down tracker fails fast instead of exhausting
/// the retry budget on every caller.
#[derive(Clone)]
pub struct TrackerClient {
    http: reqwest::Client,
    base_url: String,
    auth: AuthMethod,
    retry_policy: RetryPolicy,
    circuit_breaker: DefaultCircuitBreaker<Value, ApiError>,
}

impl TrackerClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| ApiError::Configuration(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth: config.auth,
            retry_policy: RetryPolicy::new(
                config.max_retries,
                config.initial_retry_delay,
                config.max_retry_delay,
                2.0,
            ),
            circuit_breaker: DefaultCircuitBreakerFactory.create_typed_circuit_breaker(tracker_circuit_breaker_config()),
        })
    }

    /// Current circuit breaker state, exposed for the Health Monitor's
    /// `CircuitBreakerProbe` (spec §4.11).
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    /// Run `op` through the circuit breaker, folding its control-flow
    /// errors back into [`ApiError`] so callers keep using one error type.
    async fn guarded<F, Fut>(&self, op: F) -> Result<Value, ApiError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Value, ApiError>> + Send,
    {
        match self.circuit_breaker.call(op).await {
            Ok(value) => Ok(value),
            Err(CircuitBreakerError::OperationFailed(e)) => Err(e),
            Err(CircuitBreakerError::CircuitOpen) | Err(CircuitBreakerError::TooManyConcurrentRequests) => {
                Err(ApiError::CircuitOpen)
            }
            Err(CircuitBreakerError::Timeout { timeout_ms }) => Err(ApiError::CircuitTimeout { timeout_ms }),
        }
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            AuthMethod::BasicToken { email, api_token } => {
                builder.basic_auth(email, Some(api_token))
            }
            AuthMethod::OAuthBearer { token } => builder.bearer_auth(token),
        }
    }

    /// Circuit-breaker-guarded request: the breaker treats the whole
    /// retry loop in [`Self::request_retrying`] as one operation, so a
    /// tracker that is down hard enough to exhaust every retry trips the
    /// breaker instead of just failing this one call.
    async fn request<T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, ApiError> {
        let value = self
            .guarded(|| self.request_retrying::<Value>(method.clone(), path, body.clone()))
            .await?;
        serde_json::from_value(value).map_err(ApiError::from)
    }

    #[instrument(skip(self, body))]
    async fn request_retrying<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;

        loop {
            let mut builder = self.authorize(self.http.request(method.clone(), &url));
            if let Some(ref b) = body {
                builder = builder.json(b);
            }

            let response = builder.send().await.map_err(|e| ApiError::Transport(e.to_string()));

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp
                            .json::<T>()
                            .await
                            .map_err(|e| ApiError::Decode(e.to_string()));
                    }

                    let retry_after_ms = retry_after_ms(&resp);
                    let message = resp.text().await.unwrap_or_default();
                    let err = ApiError::Http {
                        status: status.as_u16(),
                        message,
                        category: ErrorCategory::from_status(status.as_u16()),
                        retry_after_ms,
                    };

                    if err.is_transient() && self.retry_policy.should_retry(attempt) {
                        let delay = err
                            .retry_after_ms()
                            .map(Duration::from_millis)
                            .unwrap_or_else(|| self.retry_policy.calculate_delay(attempt));
                        warn!(attempt, status = %status, "retrying tracker request after delay");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
                Err(err) => {
                    if err.is_transient() && self.retry_policy.should_retry(attempt) {
                        let delay = self.retry_policy.calculate_delay(attempt);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn request_no_body<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
    ) -> Result<T, ApiError> {
        self.request(method, path, None).await
    }

    // ------------------------------------------------------------------
    // Issue operations
    // ------------------------------------------------------------------

    /// Fetch an issue by key.
    pub async fn get_issue(&self, issue_key: &str) -> Result<Issue, ApiError> {
        self.request_no_body(Method::GET, &format!("/issue/{issue_key}"))
            .await
    }

    /// PUT the given fields onto an issue. Used by `update-issue` and
    /// `update-custom-field`.
    pub async fn update_issue(
        &self,
        issue_key: &str,
        request: &UpdateIssueRequest,
    ) -> Result<(), ApiError> {
        self.put_empty(&format!("/issue/{issue_key}"), serde_json::to_value(request)?)
            .await
    }

    /// Create a new issue, returning its key and id.
    pub async fn create_issue(&self, request: &CreateIssueRequest) -> Result<IssueRef, ApiError> {
        self.request(
            Method::POST,
            "/issue",
            Some(serde_json::to_value(request)?),
        )
        .await
    }

    /// Add a comment to an issue.
    pub async fn add_comment(&self, issue_key: &str, comment: &Comment) -> Result<(), ApiError> {
        self.put_empty(
            &format!("/issue/{issue_key}/comment"),
            serde_json::to_value(comment)?,
        )
        .await
    }

    /// List the transitions currently available for an issue.
    pub async fn list_transitions(&self, issue_key: &str) -> Result<Vec<Transition>, ApiError> {
        #[derive(serde::Deserialize)]
        struct Envelope {
            transitions: Vec<Transition>,
        }
        let envelope: Envelope = self
            .request_no_body(Method::GET, &format!("/issue/{issue_key}/transitions"))
            .await?;
        Ok(envelope.transitions)
    }

    /// Resolve a transition name to its id by listing transitions and
    /// matching case-sensitively, failing if there is no exact match.
    pub async fn resolve_transition_id(
        &self,
        issue_key: &str,
        name: &str,
    ) -> Result<String, ApiError> {
        let transitions = self.list_transitions(issue_key).await?;
        transitions
            .into_iter()
            .find(|t| t.name == name)
            .map(|t| t.id)
            .ok_or_else(|| ApiError::TransitionNotFound(name.to_string()))
    }

    /// Apply a transition (by id) to an issue.
    pub async fn apply_transition(
        &self,
        issue_key: &str,
        transition_id: &str,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({ "transition": { "id": transition_id } });
        self.put_empty(&format!("/issue/{issue_key}/transitions"), body)
            .await
    }

    /// Assign (or unassign when `assignee_id` is `None`) an issue.
    pub async fn assign_issue(
        &self,
        issue_key: &str,
        assignee_id: Option<&str>,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({ "accountId": assignee_id });
        self.put_empty(&format!("/issue/{issue_key}/assignee"), body)
            .await
    }

    /// Look up a user by email, used when an action config supplies
    /// `assignee_email` rather than `assignee_id`.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let users: Vec<User> = self
            .request_no_body(Method::GET, &format!("/user/search?query={email}"))
            .await?;
        Ok(users.into_iter().next())
    }

    /// Create a link between two issues.
    pub async fn link_issues(
        &self,
        inward_issue_key: &str,
        outward_issue_key: &str,
        link_type: &str,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({
            "type": { "name": link_type },
            "inwardIssue": { "key": inward_issue_key },
            "outwardIssue": { "key": outward_issue_key },
        });
        self.put_empty("/issueLink", body).await
    }

    // ------------------------------------------------------------------
    // Search / bulk
    // ------------------------------------------------------------------

    /// Execute a tracker query (JQL-equivalent), paginated by the caller via
    /// `start_at`/`max_results`.
    pub async fn search(
        &self,
        query: &str,
        start_at: u64,
        max_results: u32,
    ) -> Result<SearchResult, ApiError> {
        self.request_no_body(
            Method::GET,
            &format!("/search?jql={query}&startAt={start_at}&maxResults={max_results}"),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Field schema / group / project metadata
    // ------------------------------------------------------------------

    /// Fetch field metadata for a project, already compressed into the
    /// engine's closed field-type vocabulary.
    pub async fn get_fields(&self, project_key: &str) -> Result<Vec<FieldSchema>, ApiError> {
        #[derive(serde::Deserialize)]
        struct RawField {
            id: String,
            name: String,
            #[serde(rename = "schema")]
            raw_schema: Option<RawFieldSchema>,
            required: Option<bool>,
            #[serde(rename = "allowedValues")]
            allowed_values: Option<Vec<serde_json::Value>>,
        }
        #[derive(serde::Deserialize)]
        struct RawFieldSchema {
            #[serde(rename = "custom")]
            custom_type: Option<String>,
            #[serde(rename = "type")]
            base_type: String,
        }

        let raw: Vec<RawField> = self
            .request_no_body(Method::GET, &format!("/project/{project_key}/field"))
            .await?;

        Ok(raw
            .into_iter()
            .map(|f| {
                let type_str = f
                    .raw_schema
                    .as_ref()
                    .and_then(|s| s.custom_type.clone())
                    .or_else(|| f.raw_schema.as_ref().map(|s| s.base_type.clone()))
                    .unwrap_or_else(|| "string".to_string());
                FieldSchema {
                    id: f.id,
                    name: f.name,
                    field_type: FieldType::compress(&type_str),
                    required: f.required.unwrap_or(false),
                    allowed_values: f.allowed_values.map(|values| {
                        values
                            .into_iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect()
                    }),
                }
            })
            .collect())
    }

    /// Fetch a named group's membership, used by the `USER_IN_GROUP`
    /// condition.
    pub async fn get_group(&self, group_name: &str) -> Result<Group, ApiError> {
        self.request_no_body(Method::GET, &format!("/group?groupname={group_name}"))
            .await
    }

    /// Fetch a project's category, used by the `PROJECT_CATEGORY` condition.
    pub async fn get_project(&self, project_key: &str) -> Result<Project, ApiError> {
        self.request_no_body(Method::GET, &format!("/project/{project_key}"))
            .await
    }

    async fn put_empty(&self, path: &str, body: Value) -> Result<(), ApiError> {
        #[derive(serde::Deserialize)]
        struct Empty;
        let _: Option<Empty> = self
            .request_opt(Method::PUT, path, Some(body))
            .await?;
        Ok(())
    }

    /// Like `request`, but tolerates an empty response body (many tracker
    /// mutation endpoints return `204 No Content`). Guarded by the same
    /// circuit breaker, representing "no body" as `Value::Null` so both
    /// request flavors share one breaker instance keyed by `Value`.
    async fn request_opt<T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<Value>) -> Result<Option<T>, ApiError> {
        let value = self
            .guarded(|| async {
                match self.request_opt_retrying::<Value>(method.clone(), path, body.clone()).await {
                    Ok(Some(v)) => Ok(v),
                    Ok(None) => Ok(Value::Null),
                    Err(e) => Err(e),
                }
            })
            .await?;
        if value.is_null() {
            Ok(None)
        } else {
            serde_json::from_value(value).map(Some).map_err(ApiError::from)
        }
    }

    async fn request_opt_retrying<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<T>, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;

        loop {
            let mut builder = self.authorize(self.http.request(method.clone(), &url));
            if let Some(ref b) = body {
                builder = builder.json(b);
            }

            match builder.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        if status == StatusCode::NO_CONTENT {
                            return Ok(None);
                        }
                        let bytes = resp.bytes().await.map_err(|e| ApiError::Decode(e.to_string()))?;
                        if bytes.is_empty() {
                            return Ok(None);
                        }
                        return serde_json::from_slice(&bytes)
                            .map(Some)
                            .map_err(|e| ApiError::Decode(e.to_string()));
                    }

                    let retry_after_ms = retry_after_ms(&resp);
                    let message = resp.text().await.unwrap_or_default();
                    let err = ApiError::Http {
                        status: status.as_u16(),
                        message,
                        category: ErrorCategory::from_status(status.as_u16()),
                        retry_after_ms,
                    };

                    if err.is_transient() && self.retry_policy.should_retry(attempt) {
                        let delay = err
                            .retry_after_ms()
                            .map(Duration::from_millis)
                            .unwrap_or_else(|| self.retry_policy.calculate_delay(attempt));
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    let transport = ApiError::Transport(e.to_string());
                    if transport.is_transient() && self.retry_policy.should_retry(attempt) {
                        let delay = self.retry_policy.calculate_delay(attempt);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(transport);
                }
            }
        }
    }
}

fn retry_after_ms(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(|secs| secs * 1_000)
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
