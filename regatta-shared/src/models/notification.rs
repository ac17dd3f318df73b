//! Notification model and database operations
//!
//! Notifications double as moderation records. A `moderation` or `invite`
//! row with `actionType` metadata IS the pending request: deleting the row
//! resolves it, and a delete that affects zero rows means someone else
//! already resolved it. `instant` rows are plain messages and stay until
//! the recipient clears them.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE notification_kind AS ENUM ('instant', 'invite', 'moderation');
//!
//! CREATE TABLE notifications (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     to_user UUID NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
//!     content TEXT NOT NULL,
//!     kind notification_kind NOT NULL DEFAULT 'instant',
//!     is_read BOOLEAN NOT NULL DEFAULT FALSE,
//!     metadata JSONB,
//!     action_url TEXT,
//!     sender_id UUID REFERENCES profiles(id) ON DELETE SET NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! # Example
//!
//! ```no_run
//! use regatta_shared::models::notification::{CreateNotification, Notification, NotificationKind};
//! use serde_json::json;
//! use sqlx::PgPool;
//! use uuid::Uuid;
//!
//! # async fn example(pool: PgPool, captain: Uuid, requester: Uuid, team: Uuid) -> Result<(), sqlx::Error> {
//! let notification = Notification::create(&pool, CreateNotification {
//!     to_user: captain,
//!     content: "@user:..._Dana_Kim requests to join your team".to_string(),
//!     kind: NotificationKind::Moderation,
//!     metadata: Some(json!({
//!         "actionType": "team_join",
//!         "entityId": team,
//!         "entityType": "team",
//!     })),
//!     action_url: Some(format!("/dashboard?team={}", team)),
//!     sender_id: Some(requester),
//! }).await?;
//!
//! // Resolving the request later deletes the row; false = already resolved
//! let claimed = Notification::delete(&pool, notification.id).await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// Notification kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Plain message; no pending action
    Instant,

    /// Team invite awaiting the invitee's response
    Invite,

    /// Moderation request awaiting an approver's response
    Moderation,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Instant => "instant",
            NotificationKind::Invite => "invite",
            NotificationKind::Moderation => "moderation",
        }
    }

    /// Checks if notifications of this kind carry a pending action
    pub fn is_actionable(&self) -> bool {
        matches!(self, NotificationKind::Invite | NotificationKind::Moderation)
    }
}

/// Notification row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    /// Unique notification ID
    pub id: Uuid,

    /// Recipient's profile ID
    pub to_user: Uuid,

    /// Human-readable content, possibly containing entity mentions
    pub content: String,

    /// Notification kind
    pub kind: NotificationKind,

    /// Whether the recipient has read it
    pub is_read: bool,

    /// Action metadata (`actionType` plus action-specific fields)
    pub metadata: Option<JsonValue>,

    /// Where the client should navigate on click
    pub action_url: Option<String>,

    /// Who triggered it (nullable if profile removed)
    pub sender_id: Option<Uuid>,

    /// When the notification was created
    pub created_at: DateTime<Utc>,
}

/// Input for creating a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotification {
    /// Recipient's profile ID
    pub to_user: Uuid,

    /// Human-readable content
    pub content: String,

    /// Notification kind
    pub kind: NotificationKind,

    /// Action metadata
    pub metadata: Option<JsonValue>,

    /// Click-through URL
    pub action_url: Option<String>,

    /// Who triggered it
    pub sender_id: Option<Uuid>,
}

impl Notification {
    /// Creates a notification row
    pub async fn create(pool: &PgPool, data: CreateNotification) -> Result<Self, sqlx::Error> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (to_user, content, kind, metadata, action_url, sender_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, to_user, content, kind, is_read, metadata, action_url,
                      sender_id, created_at
            "#,
        )
        .bind(data.to_user)
        .bind(data.content)
        .bind(data.kind)
        .bind(data.metadata)
        .bind(data.action_url)
        .bind(data.sender_id)
        .fetch_one(pool)
        .await?;

        Ok(notification)
    }

    /// Finds a notification by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, to_user, content, kind, is_read, metadata, action_url,
                   sender_id, created_at
            FROM notifications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(notification)
    }

    /// Deletes a notification
    ///
    /// Returns false if the row was already gone. For moderation records
    /// this is the idempotency boundary: the caller that sees false lost
    /// the race to resolve.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks a notification as read
    ///
    /// Returns false if the row does not exist.
    pub async fn mark_read(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists a user's notifications, newest first
    ///
    /// This is the reconciliation read a client performs on (re)connect.
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, to_user, content, kind, is_read, metadata, action_url,
                   sender_id, created_at
            FROM notifications
            WHERE to_user = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(notifications)
    }

    /// Counts a user's unread notifications
    pub async fn count_unread(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE to_user = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}
