//! Per-principal rate limiting (C1, spec §4.1).
//!
//! A fixed-size window counter per principal: `N` allowed requests per
//! window of size `W`. Counters are independent per principal; there is no
//! shared budget. Also exposes the backoff helper used by the webhook
//! dispatcher and tracker client call sites that want jittered delays.

use crate::model::PrincipalId;
use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Outcome of a `check` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after_ms: Option<u64>,
}

#[derive(Debug, Clone)]
struct Window {
    count: u32,
    started_at: Instant,
}

/// Per-principal configuration override. Falls back to the limiter's
/// default `(window, max)` when absent.
#[derive(Debug, Clone, Copy)]
pub struct PrincipalLimit {
    pub window: Duration,
    pub max_requests: u32,
}

/// Token-bucket-by-fixed-window limiter, keyed per principal.
pub struct RateLimiter {
    default_limit: PrincipalLimit,
    overrides: RwLock<HashMap<PrincipalId, PrincipalLimit>>,
    windows: RwLock<HashMap<PrincipalId, Window>>,
}

impl RateLimiter {
    /// `window` default 60s, `max_requests` default 100 per spec §4.1.
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            default_limit: PrincipalLimit {
                window,
                max_requests,
            },
            overrides: RwLock::new(HashMap::new()),
            windows: RwLock::new(HashMap::new()),
        }
    }

    pub async fn set_principal_limit(&self, principal: PrincipalId, limit: PrincipalLimit) {
        self.overrides.write().await.insert(principal, limit);
    }

    async fn limit_for(&self, principal: &PrincipalId) -> PrincipalLimit {
        self.overrides
            .read()
            .await
            .get(principal)
            .copied()
            .unwrap_or(self.default_limit)
    }

    /// `check(principal) -> {allowed, remaining, retry_after_ms?}` per §4.1.
    pub async fn check(&self, principal: &PrincipalId) -> RateLimitDecision {
        let limit = self.limit_for(principal).await;
        let now = Instant::now();
        let mut windows = self.windows.write().await;

        let entry = windows.get_mut(principal);
        match entry {
            None => {
                windows.insert(
                    principal.clone(),
                    Window {
                        count: 1,
                        started_at: now,
                    },
                );
                RateLimitDecision {
                    allowed: true,
                    remaining: limit.max_requests.saturating_sub(1),
                    retry_after_ms: None,
                }
            }
            Some(window) if now.duration_since(window.started_at) >= limit.window => {
                window.count = 1;
                window.started_at = now;
                RateLimitDecision {
                    allowed: true,
                    remaining: limit.max_requests.saturating_sub(1),
                    retry_after_ms: None,
                }
            }
            Some(window) if window.count >= limit.max_requests => {
                let window_end = window.started_at + limit.window;
                let retry_after = window_end.saturating_duration_since(now);
                RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    retry_after_ms: Some(retry_after.as_millis() as u64),
                }
            }
            Some(window) => {
                window.count += 1;
                RateLimitDecision {
                    allowed: true,
                    remaining: limit.max_requests.saturating_sub(window.count),
                    retry_after_ms: None,
                }
            }
        }
    }

    /// Drop expired windows. Callers may wire this into the engine's
    /// retention sweep; it has no effect on correctness, only memory.
    pub async fn cleanup(&self) {
        let mut windows = self.windows.write().await;
        let overrides = self.overrides.read().await;
        let now = Instant::now();
        windows.retain(|principal, window| {
            let limit = overrides.get(principal).copied().unwrap_or(self.default_limit);
            now.duration_since(window.started_at) < limit.window
        });
    }

    /// `backoff(attempt, base) = min(base * 2^attempt * (1 + jitter), 60s)`.
    pub fn backoff(attempt: u32, base: Duration) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.0..0.2);
        let scaled = base.as_secs_f64() * 2f64.powi(attempt as i32) * (1.0 + jitter);
        Duration::from_secs_f64(scaled.min(60.0))
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), 100)
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
