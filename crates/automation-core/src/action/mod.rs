//! Action Executor (C6, spec §4.6): the `ActionAdapter` seam, the fixed
//! registry of the eleven action-type adapters, and the dispatcher that ties
//! them to an `Action` and an `ExecutionContext`.

pub mod adapters;
pub mod executor;

pub use adapters::{
    AddCommentAdapter, AssignIssueAdapter, BulkOperationAdapter, CreateIssueAdapter, CreateSubtaskAdapter,
    LinkIssuesAdapter, SendNotificationAdapter, TransitionIssueAdapter, UpdateCustomFieldAdapter,
    UpdateIssueAdapter, WebhookCallAdapter,
};
pub use executor::{execute_action, ActionAdapter, ActionAdapterRegistry, ActionError};

use crate::bulk::BulkProgressStore;
use std::sync::Arc;
use tracker_client::TrackerClient;

/// Build the registry wiring every action type to its adapter, the way the
/// Engine assembles it once at startup.
pub fn default_registry(client: Arc<TrackerClient>, bulk_store: Arc<dyn BulkProgressStore>) -> ActionAdapterRegistry {
    ActionAdapterRegistry::new()
        .register(Box::new(UpdateIssueAdapter::new(client.clone())))
        .register(Box::new(TransitionIssueAdapter::new(client.clone())))
        .register(Box::new(CreateIssueAdapter::new(client.clone())))
        .register(Box::new(AddCommentAdapter::new(client.clone())))
        .register(Box::new(AssignIssueAdapter::new(client.clone())))
        .register(Box::new(SendNotificationAdapter))
        .register(Box::new(WebhookCallAdapter::new(reqwest::Client::new())))
        .register(Box::new(BulkOperationAdapter::new(client.clone(), bulk_store)))
        .register(Box::new(CreateSubtaskAdapter::new(client.clone())))
        .register(Box::new(LinkIssuesAdapter::new(client.clone())))
        .register(Box::new(UpdateCustomFieldAdapter::new(client)))
}
