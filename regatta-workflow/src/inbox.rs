//! Client-side inbox cache
//!
//! [`InboxCache`] is the reconciliation half of the channel contract.
//! Live events are at-least-once and only cover the subscription window,
//! so a client owns a cache and drives it with two inputs:
//!
//! 1. On (re)connect, [`InboxCache::reconcile`] with a full inbox read.
//! 2. While subscribed, [`InboxCache::apply`] with each live event.
//!
//! Applying is idempotent: replayed inserts and updates overwrite by id,
//! and deletes of unknown ids are ignored, so duplicate delivery and
//! events that raced the reconciliation read both converge to the same
//! cache state.

use std::collections::HashMap;

use regatta_shared::events::{NotificationEvent, NotificationEventKind};
use regatta_shared::models::{Notification, NotificationKind};
use uuid::Uuid;

/// In-memory view of one recipient's notifications
#[derive(Debug, Default)]
pub struct InboxCache {
    entries: HashMap<Uuid, Notification>,
}

impl InboxCache {
    pub fn new() -> Self {
        InboxCache::default()
    }

    /// Replaces the cache with a fresh inbox read
    pub fn reconcile(&mut self, notifications: Vec<Notification>) {
        self.entries = notifications.into_iter().map(|n| (n.id, n)).collect();
    }

    /// Applies one live event
    pub fn apply(&mut self, event: &NotificationEvent) {
        match event.kind {
            NotificationEventKind::Inserted | NotificationEventKind::Updated => {
                self.entries
                    .insert(event.notification.id, event.notification.clone());
            }
            NotificationEventKind::Deleted => {
                self.entries.remove(&event.notification.id);
            }
        }
    }

    /// Returns all cached notifications, newest first
    pub fn all(&self) -> Vec<Notification> {
        let mut notifications: Vec<Notification> = self.entries.values().cloned().collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notifications
    }

    /// Returns cached notifications of one kind, newest first
    pub fn by_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        let mut notifications: Vec<Notification> = self
            .entries
            .values()
            .filter(|n| n.kind == kind)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notifications
    }

    /// Counts unread notifications
    pub fn unread_count(&self) -> usize {
        self.entries.values().filter(|n| !n.is_read).count()
    }

    /// Fetches one cached notification
    pub fn get(&self, id: Uuid) -> Option<&Notification> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn notification(content: &str, is_read: bool) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            to_user: Uuid::new_v4(),
            content: content.to_string(),
            kind: NotificationKind::Instant,
            is_read,
            metadata: None,
            action_url: None,
            sender_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_reconcile_replaces_contents() {
        let mut cache = InboxCache::new();
        cache.apply(&NotificationEvent {
            kind: NotificationEventKind::Inserted,
            notification: notification("pre-reconnect", false),
        });

        let fresh = vec![notification("a", false), notification("b", true)];
        cache.reconcile(fresh.clone());

        assert_eq!(cache.len(), 2);
        assert!(cache.get(fresh[0].id).is_some());
        assert_eq!(cache.unread_count(), 1);
    }

    #[test]
    fn test_apply_insert_update_delete() {
        let mut cache = InboxCache::new();
        let mut row = notification("hello", false);

        cache.apply(&NotificationEvent {
            kind: NotificationEventKind::Inserted,
            notification: row.clone(),
        });
        assert_eq!(cache.len(), 1);

        row.is_read = true;
        cache.apply(&NotificationEvent {
            kind: NotificationEventKind::Updated,
            notification: row.clone(),
        });
        assert_eq!(cache.unread_count(), 0);

        cache.apply(&NotificationEvent {
            kind: NotificationEventKind::Deleted,
            notification: row.clone(),
        });
        assert!(cache.is_empty());
    }

    #[test]
    fn test_duplicate_and_unknown_events_are_tolerated() {
        let mut cache = InboxCache::new();
        let row = notification("once", false);

        // At-least-once delivery can replay the same insert
        for _ in 0..3 {
            cache.apply(&NotificationEvent {
                kind: NotificationEventKind::Inserted,
                notification: row.clone(),
            });
        }
        assert_eq!(cache.len(), 1);

        // A delete for something the cache never saw is a no-op
        cache.apply(&NotificationEvent {
            kind: NotificationEventKind::Deleted,
            notification: notification("never seen", false),
        });
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_all_is_newest_first() {
        let mut cache = InboxCache::new();
        let mut older = notification("older", false);
        older.created_at = Utc::now() - Duration::minutes(5);
        let newer = notification("newer", false);

        cache.reconcile(vec![older.clone(), newer.clone()]);

        let all = cache.all();
        assert_eq!(all[0].id, newer.id);
        assert_eq!(all[1].id, older.id);
    }

    #[test]
    fn test_by_kind_filters() {
        let mut cache = InboxCache::new();
        let mut invite = notification("invite", false);
        invite.kind = NotificationKind::Invite;
        let instant = notification("instant", false);

        cache.reconcile(vec![invite.clone(), instant]);

        let invites = cache.by_kind(NotificationKind::Invite);
        assert_eq!(invites.len(), 1);
        assert_eq!(invites[0].id, invite.id);
    }
}
