//! Permission gate (C2, spec §4.2): decides whether a principal may invoke a
//! named operation, layered on top of the rate limiter.

use crate::model::PrincipalId;
use crate::rate_limit::{PrincipalLimit, RateLimiter};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;

const WRITE_MARKERS: &[&str] = &[
    "create", "update", "delete", "transition", "add", "remove", "set", "assign", "execute",
    "send", "upload", "move", "merge",
];
const DESTRUCTIVE_MARKERS: &[&str] = &["delete", "remove", "merge"];

/// Per-principal policy override.
#[derive(Debug, Clone, Default)]
pub struct PrincipalPolicy {
    pub allow_list: Option<HashSet<String>>,
    pub deny_list: Option<HashSet<String>>,
    pub read_only: bool,
    pub max_rpm: Option<u32>,
}

/// Policy applied when a principal has no explicit override.
#[derive(Debug, Clone)]
pub struct DefaultPolicy {
    pub allow_all: bool,
    pub read_only: bool,
    pub max_rpm: u32,
}

impl Default for DefaultPolicy {
    fn default() -> Self {
        Self {
            allow_all: true,
            read_only: false,
            max_rpm: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub requires_confirmation: bool,
}

impl PermissionDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            requires_confirmation: false,
        }
    }

    fn allow_with_confirmation() -> Self {
        Self {
            allowed: true,
            reason: None,
            requires_confirmation: true,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            requires_confirmation: false,
        }
    }
}

pub struct PermissionGate {
    per_principal: RwLock<HashMap<PrincipalId, PrincipalPolicy>>,
    default_policy: RwLock<DefaultPolicy>,
    rate_limiter: RateLimiter,
}

impl PermissionGate {
    pub fn new(default_policy: DefaultPolicy) -> Self {
        let rate_limiter = RateLimiter::new(Duration::from_secs(60), default_policy.max_rpm);
        Self {
            per_principal: RwLock::new(HashMap::new()),
            default_policy: RwLock::new(default_policy),
            rate_limiter,
        }
    }

    pub async fn set_principal_policy(&self, principal: PrincipalId, policy: PrincipalPolicy) {
        if let Some(max_rpm) = policy.max_rpm {
            self.rate_limiter
                .set_principal_limit(
                    principal.clone(),
                    PrincipalLimit {
                        window: Duration::from_secs(60),
                        max_requests: max_rpm,
                    },
                )
                .await;
        }
        self.per_principal.write().await.insert(principal, policy);
    }

    pub async fn set_default_policy(&self, policy: DefaultPolicy) {
        *self.default_policy.write().await = policy;
    }

    /// `check(principal, op_name) -> {allowed, reason?, requires_confirmation?}`
    /// per §4.2's four-step decision.
    pub async fn check(&self, principal: &PrincipalId, op_name: &str) -> PermissionDecision {
        // Step 1: rate limit.
        let rate_decision = self.rate_limiter.check(principal).await;
        if !rate_decision.allowed {
            return PermissionDecision::deny("rate limit");
        }

        let policies = self.per_principal.read().await;
        let policy = policies.get(principal);
        let default_policy = self.default_policy.read().await;

        // Step 2: deny list.
        if let Some(policy) = policy {
            if let Some(deny_list) = &policy.deny_list {
                if deny_list.contains(op_name) {
                    return PermissionDecision::deny(format!("{op_name} is denied"));
                }
            }
        }

        // Step 3: allow list / default allow-all.
        let allowed_by_policy = policy
            .and_then(|p| p.allow_list.as_ref())
            .map(|list| list.contains(op_name))
            .unwrap_or(false)
            || default_policy.allow_all;
        if !allowed_by_policy {
            return PermissionDecision::deny(format!("{op_name} is not in the allow list"));
        }

        // Step 4: classify write/destructive.
        let is_write = WRITE_MARKERS.iter().any(|m| op_name.contains(m));
        let is_destructive = DESTRUCTIVE_MARKERS.iter().any(|m| op_name.contains(m));
        let read_only = policy.map(|p| p.read_only).unwrap_or(default_policy.read_only);

        if is_write && read_only {
            return PermissionDecision::deny(format!("{op_name} is a write operation but principal is read-only"));
        }
        if is_destructive {
            return PermissionDecision::allow_with_confirmation();
        }
        PermissionDecision::allow()
    }
}

impl Default for PermissionGate {
    fn default() -> Self {
        Self::new(DefaultPolicy::default())
    }
}

#[cfg(test)]
#[path = "permission_tests.rs"]
mod tests;
