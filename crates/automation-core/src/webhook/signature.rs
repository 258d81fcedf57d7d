//! Outbound webhook payload construction and HMAC-SHA256 signing/verification
//! (spec §4.5, §6 "Outbound webhook payload (bit-exact when a signature is
//! used)").

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// The wire-level payload shape. Field order in the derived `Serialize`
/// impl matches declaration order, which matches the bit-exact shape the
/// spec pins down: `event`, `data`, `timestamp`, `webhookId`.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub event: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "webhookId")]
    pub webhook_id: String,
}

impl WebhookPayload {
    pub fn new(event: impl Into<String>, data: serde_json::Value, webhook_id: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data,
            timestamp: Utc::now(),
            webhook_id: webhook_id.into(),
        }
    }

    /// Serialize for signature/transport: UTF-8, key order as declared,
    /// no extra whitespace (`serde_json::to_string` emits compact JSON and
    /// never reorders object keys for a struct).
    pub fn serialize(&self) -> String {
        serde_json::to_string(self).expect("WebhookPayload always serializes")
    }
}

/// `hex("sha256=" + HMAC_SHA256(secret, payload))` — in practice this is
/// the lowercase hex digest of the HMAC, prefixed with the literal
/// `sha256=` before hex-encoding isn't meaningful for a MAC, so the
/// header value is `sha256=<hex digest>` (`X-Webhook-Signature`).
pub fn sign(serialized_payload: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(serialized_payload.as_bytes());
    let digest = mac.finalize().into_bytes();
    format!("sha256={}", hex::encode(digest))
}

/// Reverse the signature computation and perform a constant-time compare
/// on the hex digest bytes (spec §4.5 "Incoming webhook verification").
pub fn verify(serialized_payload: &str, signature_header: &str, secret: &str) -> bool {
    let expected = sign(serialized_payload, secret);
    let expected_bytes = expected.as_bytes();
    let actual_bytes = signature_header.as_bytes();
    if expected_bytes.len() != actual_bytes.len() {
        return false;
    }
    expected_bytes.ct_eq(actual_bytes).into()
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
