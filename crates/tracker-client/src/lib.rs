//! # Tracker Client
//!
//! HTTP client SDK for the external issue-tracking service consumed by the
//! automation engine's Action Executor and Condition Evaluator.
//!
//! This crate treats the tracker as an opaque REST collaborator: it knows the
//! shape of issues, comments, transitions, and field metadata, and how to
//! authenticate and retry against the tracker's API, but it has no knowledge
//! of rules, triggers, or the automation runtime itself.
//!
//! ## Authentication
//!
//! Either an email + API token pair, or a bearer OAuth token:
//!
//! ```rust,no_run
//! use tracker_client::{AuthMethod, ClientConfig, TrackerClient};
//!
//! let config = ClientConfig::builder()
//!     .base_url("https://tracker.example.com")
//!     .auth(AuthMethod::BasicToken {
//!         email: "bot@example.com".into(),
//!         api_token: "secret".into(),
//!     })
//!     .build();
//!
//! let client = TrackerClient::new(config).expect("valid client config");
//! ```

pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod retry;

pub use circuit_breaker::{
    tracker_circuit_breaker_config, webhook_dispatch_circuit_breaker_config, CircuitBreaker, CircuitBreakerConfig,
    CircuitBreakerError, CircuitBreakerFactory, CircuitMetrics, CircuitState, DefaultCircuitBreaker,
    DefaultCircuitBreakerFactory,
};
pub use client::TrackerClient;
pub use config::{AuthMethod, ClientConfig, ClientConfigBuilder};
pub use error::{ApiError, ErrorCategory};
pub use models::{
    Comment, CreateIssueRequest, FieldSchema, FieldType, Group, Issue, IssueRef, Project,
    SearchResult, Transition, UpdateIssueRequest, User,
};
pub use retry::RetryPolicy;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
