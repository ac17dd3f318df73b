//! Notification events
//!
//! Every mutation of a user's notification set is mirrored to that user's
//! Redis Stream as a [`NotificationEvent`], so live subscribers can keep an
//! in-memory inbox current without polling. Delivery is at-least-once to
//! subscribers attached at publish time; a client that (re)connects later
//! reconciles from the database and then applies events.

pub mod serialization;

pub use serialization::{
    deserialize_notification_event, inbox_stream_key, serialize_notification_event,
    SerializationError,
};

use crate::models::Notification;
use serde::{Deserialize, Serialize};

/// What happened to a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEventKind {
    /// A new notification was created
    Inserted,

    /// An existing notification changed (currently only mark-read)
    Updated,

    /// A notification was removed or its request was resolved
    Deleted,
}

impl NotificationEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEventKind::Inserted => "inserted",
            NotificationEventKind::Updated => "updated",
            NotificationEventKind::Deleted => "deleted",
        }
    }
}

/// One change to a user's notification set
///
/// Carries the full row in all cases; for `Deleted` this is the row as it
/// was just before removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// What happened
    pub kind: NotificationEventKind,

    /// The affected notification
    pub notification: Notification,
}
