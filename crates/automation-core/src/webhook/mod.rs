//! Outbound webhook delivery (C5) and the `WebhookIntegration` data model
//! (§3). Owns `WebhookIntegration` values and their retry queues
//! exclusively, per §3 "Ownership".

pub mod dispatcher;
pub mod integration;
pub mod signature;

pub use dispatcher::{WebhookDispatchError, WebhookDispatcher};
pub use integration::{RetryPolicy, WebhookIntegration, WebhookIntegrationSpec};
