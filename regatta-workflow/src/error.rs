//! Workflow error taxonomy
//!
//! [`WorkflowError`] is the orchestrator's result currency. The variants
//! partition cleanly:
//!
//! - `ValidationFailed`: the intent was never valid; nothing changed and
//!   any moderation record is untouched.
//! - `NotFound`: an entity or record the intent names does not exist. For
//!   resolutions this is the idempotency signal: the record was already
//!   claimed by someone else.
//! - `StaleState`: the record was valid once but the world moved on; the
//!   record has been claimed and cleared.
//! - `UnhandledActionType`: the record's metadata names an action this
//!   version cannot execute; the record has been cleared as a rejection.
//! - `PartialNotificationFailure`: state changed and some notifications
//!   landed, but others did not. Retry delivery with
//!   [`crate::orchestrator::WorkflowOrchestrator::republish`]; never
//!   re-run the intent.

use regatta_shared::models::{CreateNotification, Notification};
use thiserror::Error;
use uuid::Uuid;

use crate::channel::ChannelError;
use crate::engine::DenyReason;
use crate::store::StoreError;

/// One notification draft that could not be delivered
#[derive(Debug, Clone)]
pub struct FailedDelivery {
    /// The draft to retry
    pub draft: CreateNotification,

    /// Why the last attempt failed
    pub error: String,
}

/// Workflow execution errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The intent is not valid for this actor and state
    #[error("validation failed: {reason}")]
    ValidationFailed { reason: DenyReason },

    /// A named entity or moderation record does not exist
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: Uuid },

    /// The moderation record was outrun by other changes
    #[error("state changed since the request was created: {reason}")]
    StaleState { reason: DenyReason },

    /// The record carries an action this version cannot execute
    #[error("unhandled action type: {action_type}")]
    UnhandledActionType { action_type: String },

    /// State was written but some notifications were not delivered
    #[error("delivered {} notification(s), {} failed", .delivered.len(), .failed.len())]
    PartialNotificationFailure {
        delivered: Vec<Notification>,
        failed: Vec<FailedDelivery>,
    },

    /// Entity store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Notification channel failure
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

impl WorkflowError {
    /// Returns a stable machine-readable code for this error
    pub fn reason_code(&self) -> &'static str {
        match self {
            WorkflowError::ValidationFailed { reason } => reason.code(),
            WorkflowError::StaleState { reason } => reason.code(),
            WorkflowError::NotFound { .. } => "not_found",
            WorkflowError::UnhandledActionType { .. } => "unhandled_action_type",
            WorkflowError::PartialNotificationFailure { .. } => "partial_notification_failure",
            WorkflowError::Store(_) => "store_error",
            WorkflowError::Channel(_) => "channel_error",
        }
    }
}
