//! Notification event serialization for Redis Streams
//!
//! Redis Streams store entries as field-value string pairs. Each
//! [`NotificationEvent`] becomes:
//!
//! ```text
//! event: "inserted" | "updated" | "deleted"
//! id: "<notification uuid>"
//! payload: "<notification row as JSON>"
//! ```
//!
//! The `id` field exists so operators can eyeball a stream with XRANGE
//! without unpacking payloads; deserialization reads only `event` and
//! `payload`.
//!
//! # Stream Naming
//!
//! Each recipient has one stream, keyed `inbox:{user_id}`.

use crate::events::{NotificationEvent, NotificationEventKind};
use crate::models::Notification;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Serialization errors
#[derive(Error, Debug)]
pub enum SerializationError {
    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Invalid field value
    #[error("Invalid field value for {field}: {error}")]
    InvalidValue { field: String, error: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Serializes a NotificationEvent to Redis Stream field-value pairs.
pub fn serialize_notification_event(
    event: &NotificationEvent,
) -> Result<HashMap<String, String>, SerializationError> {
    let mut fields = HashMap::new();

    fields.insert("event".to_string(), event.kind.as_str().to_string());
    fields.insert("id".to_string(), event.notification.id.to_string());
    fields.insert(
        "payload".to_string(),
        serde_json::to_string(&event.notification)?,
    );

    Ok(fields)
}

/// Deserializes a NotificationEvent from Redis Stream field-value pairs.
///
/// # Errors
///
/// Returns an error if `event` or `payload` is missing, the event kind is
/// unknown, or the payload is not a valid notification row.
pub fn deserialize_notification_event(
    fields: &HashMap<String, String>,
) -> Result<NotificationEvent, SerializationError> {
    let kind_str = fields
        .get("event")
        .ok_or_else(|| SerializationError::MissingField("event".to_string()))?;
    let kind = match kind_str.as_str() {
        "inserted" => NotificationEventKind::Inserted,
        "updated" => NotificationEventKind::Updated,
        "deleted" => NotificationEventKind::Deleted,
        other => {
            return Err(SerializationError::InvalidValue {
                field: "event".to_string(),
                error: format!("unknown event kind: {}", other),
            })
        }
    };

    let payload = fields
        .get("payload")
        .ok_or_else(|| SerializationError::MissingField("payload".to_string()))?;
    let notification: Notification = serde_json::from_str(payload)?;

    Ok(NotificationEvent { kind, notification })
}

/// Generates the Redis Stream key for a user's inbox
///
/// # Example
///
/// ```
/// use regatta_shared::events::serialization::inbox_stream_key;
/// use uuid::Uuid;
///
/// let user_id = Uuid::new_v4();
/// let key = inbox_stream_key(user_id);
/// assert!(key.starts_with("inbox:"));
/// ```
pub fn inbox_stream_key(user_id: Uuid) -> String {
    format!("inbox:{}", user_id)
}
