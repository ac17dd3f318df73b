/// Inbox endpoints
///
/// Snapshot reads, mark-read, and the live SSE stream. A client builds
/// its inbox by reading the snapshot, then applying events from the
/// stream; after a dropped stream it re-reads the snapshot rather than
/// assuming it saw every event.
///
/// # Endpoints
///
/// ```text
/// GET  /v1/inbox/:user_id              # Snapshot, newest first
/// GET  /v1/inbox/:user_id?kind=invite  # Filtered snapshot
/// GET  /v1/inbox/:user_id/stream       # SSE: insert/update/delete events
/// POST /v1/notifications/:id/read      # Mark one notification read
/// ```
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{Stream, StreamExt};
use regatta_shared::models::{Notification, NotificationKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbox snapshot query parameters
#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    /// Restrict the snapshot to one notification kind
    pub kind: Option<NotificationKind>,
}

/// Mark-read response
#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    /// Whether the notification row was updated
    pub updated: bool,
}

/// Returns a user's notifications, newest first
pub async fn get_inbox(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let mut notifications = state.channel.inbox(user_id).await?;

    if let Some(kind) = query.kind {
        notifications.retain(|n| n.kind == kind);
    }

    Ok(Json(notifications))
}

/// Marks one notification as read
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MarkReadResponse>> {
    let updated = state.channel.mark_read(id).await?;
    if !updated {
        return Err(ApiError::NotFound(format!("Notification {} not found", id)));
    }

    Ok(Json(MarkReadResponse { updated }))
}

/// Streams a user's inbox events as SSE
///
/// Each message carries the notification row as JSON under an event name
/// of `inserted`, `updated`, or `deleted`. Dropping the connection
/// cancels the underlying channel subscription.
pub async fn stream_inbox(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let subscription = state.channel.subscribe(user_id).await?;
    tracing::debug!(user_id = %user_id, "Opened inbox event stream");

    let stream = futures::stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.recv().await?;
        Some((event, subscription))
    })
    .map(|event| {
        Event::default()
            .event(event.kind.as_str())
            .json_data(&event.notification)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
