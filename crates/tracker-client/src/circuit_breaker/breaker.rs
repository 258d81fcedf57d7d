use super::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerFactory, CircuitMetrics, CircuitState};
use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

struct InternalState {
    current_state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    half_open_concurrent: u32,
    last_state_change: chrono::DateTime<Utc>,
    next_recovery_attempt: Option<chrono::DateTime<Utc>>,
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    rejected_requests: u64,
    total_response_time_ms: u64,
}

impl InternalState {
    fn new() -> Self {
        Self {
            current_state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            half_open_concurrent: 0,
            last_state_change: Utc::now(),
            next_recovery_attempt: None,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            rejected_requests: 0,
            total_response_time_ms: 0,
        }
    }
}

/// Standard circuit breaker wrapping a fallible async operation in a
/// timeout and the closed/open/half-open state machine (spec §4.11 ties
/// its `state()` into the Health Monitor's service probes).
pub struct DefaultCircuitBreaker<T, E> {
    config: CircuitBreakerConfig,
    state: Arc<RwLock<InternalState>>,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> DefaultCircuitBreaker<T, E> {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(InternalState::new())),
            _marker: PhantomData,
        }
    }
}

impl<T, E> Clone for DefaultCircuitBreaker<T, E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T, E> CircuitBreaker<T, E> for DefaultCircuitBreaker<T, E>
where
    T: Send + Sync,
    E: Send + Sync,
{
    async fn call<F, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        {
            let mut state = self.state.write().await;
            state.total_requests += 1;

            match state.current_state {
                CircuitState::Open => {
                    let should_probe = state
                        .next_recovery_attempt
                        .map(|t| Utc::now() >= t)
                        .unwrap_or(false);
                    if should_probe {
                        info!(service = %self.config.service_name, "circuit breaker entering half-open probe");
                        state.current_state = CircuitState::HalfOpen;
                        state.last_state_change = Utc::now();
                        state.half_open_concurrent = 0;
                        state.consecutive_successes = 0;
                    } else {
                        state.rejected_requests += 1;
                        return Err(CircuitBreakerError::CircuitOpen);
                    }
                }
                CircuitState::HalfOpen => {
                    if state.half_open_concurrent >= self.config.half_open_max_requests {
                        state.rejected_requests += 1;
                        return Err(CircuitBreakerError::TooManyConcurrentRequests);
                    }
                    state.half_open_concurrent += 1;
                }
                CircuitState::Closed => {}
            }
        }

        let started = Utc::now();
        let timeout = std::time::Duration::from_secs(self.config.operation_timeout_seconds);
        let outcome = tokio::time::timeout(timeout, operation()).await;
        let elapsed_ms = (Utc::now() - started).num_milliseconds().max(0) as u64;

        match outcome {
            Ok(Ok(value)) => {
                self.record_success(elapsed_ms).await;
                Ok(value)
            }
            Ok(Err(err)) => {
                self.record_failure(elapsed_ms).await;
                Err(CircuitBreakerError::OperationFailed(err))
            }
            Err(_) => {
                self.record_failure(elapsed_ms).await;
                Err(CircuitBreakerError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    fn state(&self) -> CircuitState {
        self.state.try_read().map(|s| s.current_state).unwrap_or(CircuitState::Closed)
    }

    fn metrics(&self) -> CircuitMetrics {
        let Ok(state) = self.state.try_read() else {
            return CircuitMetrics {
                state: CircuitState::Closed,
                total_requests: 0,
                successful_requests: 0,
                failed_requests: 0,
                rejected_requests: 0,
                consecutive_failures: 0,
                last_state_change: Utc::now(),
                next_recovery_attempt: None,
                failure_rate: 0.0,
                avg_response_time_ms: 0.0,
            };
        };
        let failure_rate = if state.total_requests == 0 {
            0.0
        } else {
            state.failed_requests as f64 / state.total_requests as f64
        };
        let avg_response_time_ms = if state.successful_requests + state.failed_requests == 0 {
            0.0
        } else {
            state.total_response_time_ms as f64 / (state.successful_requests + state.failed_requests) as f64
        };
        CircuitMetrics {
            state: state.current_state,
            total_requests: state.total_requests,
            successful_requests: state.successful_requests,
            failed_requests: state.failed_requests,
            rejected_requests: state.rejected_requests,
            consecutive_failures: state.consecutive_failures,
            last_state_change: state.last_state_change,
            next_recovery_attempt: state.next_recovery_attempt,
            failure_rate,
            avg_response_time_ms,
        }
    }

    fn reset(&self) {
        if let Ok(mut state) = self.state.try_write() {
            *state = InternalState::new();
        }
    }
}

impl<T, E> DefaultCircuitBreaker<T, E> {
    async fn record_success(&self, elapsed_ms: u64) {
        let mut state = self.state.write().await;
        state.successful_requests += 1;
        state.total_response_time_ms += elapsed_ms;
        state.consecutive_failures = 0;

        if state.current_state == CircuitState::HalfOpen {
            state.consecutive_successes += 1;
            state.half_open_concurrent = state.half_open_concurrent.saturating_sub(1);
            if state.consecutive_successes >= self.config.success_threshold {
                debug!(service = %self.config.service_name, "circuit breaker closing after recovery");
                state.current_state = CircuitState::Closed;
                state.last_state_change = Utc::now();
                state.next_recovery_attempt = None;
                state.consecutive_successes = 0;
            }
        }
    }

    async fn record_failure(&self, elapsed_ms: u64) {
        let mut state = self.state.write().await;
        state.failed_requests += 1;
        state.total_response_time_ms += elapsed_ms;
        state.consecutive_failures += 1;
        state.consecutive_successes = 0;

        if state.current_state == CircuitState::HalfOpen {
            state.half_open_concurrent = state.half_open_concurrent.saturating_sub(1);
            self.trip(&mut state);
        } else if state.current_state == CircuitState::Closed
            && state.consecutive_failures >= self.config.failure_threshold
        {
            self.trip(&mut state);
        }
    }

    fn trip(&self, state: &mut InternalState) {
        warn!(service = %self.config.service_name, failures = state.consecutive_failures, "circuit breaker tripped open");
        state.current_state = CircuitState::Open;
        state.last_state_change = Utc::now();
        state.next_recovery_attempt = Some(Utc::now() + chrono::Duration::seconds(self.config.recovery_timeout_seconds));
    }
}

#[derive(Default, Clone)]
pub struct DefaultCircuitBreakerFactory;

impl CircuitBreakerFactory for DefaultCircuitBreakerFactory {
    fn create_typed_circuit_breaker<T, E>(&self, config: CircuitBreakerConfig) -> DefaultCircuitBreaker<T, E>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        DefaultCircuitBreaker::new(config)
    }
}
