//! Smart-value resolver (C7, spec §4.7): substitutes `{path.to.field}`
//! placeholders in action configs from the execution context.
//!
//! Expansion is single-pass over the input placeholders — the resolved
//! string is never re-scanned for further `{...}` tokens — so the resolver
//! cannot loop, and applying it twice to already-resolved output is a
//! no-op (spec §8 invariant 9).

use crate::execution::ExecutionContext;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([a-zA-Z0-9_.]+)\}").unwrap())
}

/// Resolve all `{path}` placeholders inside `raw` against `ctx`. Missing
/// paths expand to the empty string.
pub fn resolve_string(raw: &str, ctx: &ExecutionContext) -> String {
    placeholder_pattern()
        .replace_all(raw, |caps: &regex::Captures| {
            let path = &caps[1];
            ctx.resolve_path(path)
                .map(|v| value_to_plain_string(&v))
                .unwrap_or_default()
        })
        .into_owned()
}

fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Walk an action config's JSON value recursively, resolving placeholders
/// in every string leaf. Non-string values (numbers, bools, null, and
/// nested structure) are left unchanged.
pub fn resolve_config(config: &Value, ctx: &ExecutionContext) -> Value {
    match config {
        Value::String(s) => Value::String(resolve_string(s, ctx)),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_config(v, ctx)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_config(v, ctx)).collect()),
        other => other.clone(),
    }
}

/// Resolve a single smart-value expression to a truthy/falsy string, used
/// by the `SMART_VALUE` condition type. Empty string is falsy.
pub fn resolve_truthy(expression: &str, ctx: &ExecutionContext) -> bool {
    let resolved = resolve_string(expression, ctx);
    !resolved.is_empty() && resolved != "false"
}

#[cfg(test)]
#[path = "smart_value_tests.rs"]
mod tests;
