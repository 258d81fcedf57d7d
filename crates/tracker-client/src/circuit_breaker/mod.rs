//! Circuit breaker resilience pattern guarding this crate's own HTTP calls
//! and, via re-export, the outbound webhook dispatcher in `automation-core`
//! (SPEC_FULL §1.1 — both external collaborators sit behind a breaker).
//!
//! `TrackerClient`'s own `RetryPolicy` already owns per-call retry/backoff;
//! this module sits one level up, tripping after a run of consecutive
//! failures so a persistently-down collaborator fails fast instead of
//! piling up retries. It lives in this crate rather than `automation-core`
//! so `TrackerClient` can embed a breaker around its own request path
//! without a dependency cycle; `automation-core` re-exports these types for
//! the webhook dispatcher and the Health Monitor (C11).
//!
//! # States
//!
//! - **Closed**: normal operation, failures are tracked.
//! - **Open**: fast-fail; requests are rejected without being attempted.
//! - **Half-Open**: a limited number of test requests are let through to
//!   probe recovery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

mod breaker;
pub use breaker::{DefaultCircuitBreaker, DefaultCircuitBreakerFactory};

#[async_trait]
pub trait CircuitBreaker<T, E>: Send + Sync {
    async fn call<F, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send;

    fn state(&self) -> CircuitState;
    fn metrics(&self) -> CircuitMetrics;
    fn reset(&self);

    fn is_healthy(&self) -> bool {
        self.state().allows_requests()
    }
}

pub trait CircuitBreakerFactory: Send + Sync {
    fn create_typed_circuit_breaker<T, E>(&self, config: CircuitBreakerConfig) -> DefaultCircuitBreaker<T, E>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn allows_requests(&self) -> bool {
        matches!(self, Self::Closed | Self::HalfOpen)
    }

    pub fn is_failure_state(&self) -> bool {
        matches!(self, Self::Open | Self::HalfOpen)
    }
}

/// Tuned per collaborator; the tracker is an interactive request path
/// (shorter recovery window), the webhook dispatcher already retries in
/// the background so its breaker only guards the health-probe path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub service_name: String,
    pub failure_threshold: u32,
    pub recovery_timeout_seconds: i64,
    pub success_threshold: u32,
    pub operation_timeout_seconds: u64,
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".to_string(),
            failure_threshold: 5,
            recovery_timeout_seconds: 30,
            success_threshold: 3,
            operation_timeout_seconds: 10,
            half_open_max_requests: 5,
        }
    }
}

/// Tuned for the tracker HTTP collaborator: interactive request path, so
/// recovery is probed sooner than a background dispatcher would need.
pub fn tracker_circuit_breaker_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        service_name: "tracker-api".to_string(),
        failure_threshold: 5,
        recovery_timeout_seconds: 30,
        success_threshold: 3,
        operation_timeout_seconds: 10,
        half_open_max_requests: 3,
    }
}

/// Tuned for the outbound webhook dispatcher (automation-core C5): its own
/// retry queue already absorbs transient failures per delivery, so this
/// breaker only guards against a target that is down hard enough that
/// queuing more retries would just pile up.
pub fn webhook_dispatch_circuit_breaker_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        service_name: "webhook-dispatcher".to_string(),
        failure_threshold: 5,
        recovery_timeout_seconds: 60,
        success_threshold: 2,
        operation_timeout_seconds: 10,
        half_open_max_requests: 2,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rejected_requests: u64,
    pub consecutive_failures: u32,
    pub last_state_change: DateTime<Utc>,
    pub next_recovery_attempt: Option<DateTime<Utc>>,
    pub failure_rate: f64,
    pub avg_response_time_ms: f64,
}

impl CircuitMetrics {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }

    pub fn should_trip(&self, threshold: u32) -> bool {
        self.consecutive_failures >= threshold
    }
}

#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker is open, requests rejected")]
    CircuitOpen,
    #[error("operation timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("operation failed: {0}")]
    OperationFailed(E),
    #[error("too many concurrent requests in half-open state")]
    TooManyConcurrentRequests,
}

impl<E> CircuitBreakerError<E> {
    pub fn counts_as_failure(&self) -> bool {
        matches!(self, Self::OperationFailed(_) | Self::Timeout { .. })
    }

    pub fn is_circuit_protection(&self) -> bool {
        matches!(self, Self::CircuitOpen | Self::TooManyConcurrentRequests)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
