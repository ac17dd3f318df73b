/// Redis Stream reader for consuming inbox events
///
/// This module provides functionality to read notification events from Redis
/// Streams with:
/// - **Backfill**: Read historical events with pagination (XREAD with COUNT)
/// - **Live tail**: Block and wait for new events in real-time (XREAD BLOCK)
///
/// # Architecture
///
/// ```text
/// Redis Streams (inbox:{user_id})
///     │
///     ├──> Backfill: XREAD COUNT 1000 STREAMS inbox:{user_id} {since_id}
///     │    Returns: Historical events in batches
///     │
///     └──> Live Tail: XREAD BLOCK 5000 STREAMS inbox:{user_id} {last_id}
///          Returns: New events as they arrive (with timeout)
/// ```
///
/// The stream is a push channel, not the source of truth. A subscriber that
/// reconnects should reconcile against the `notifications` table and only
/// then tail the stream from `"$"`; backfill exists for diagnostics and for
/// catch-up within the stream's retention window.
///
/// # Example - Live Tail
///
/// ```no_run
/// use regatta_shared::redis::client::{RedisClient, RedisConfig};
/// use regatta_shared::redis::stream_reader::StreamReader;
/// use uuid::Uuid;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = RedisConfig::from_env()?;
/// let client = RedisClient::new(config).await?;
/// let reader = StreamReader::new(client);
///
/// let user_id = Uuid::new_v4();
/// let mut last_id = "$".to_string(); // Start from end
///
/// loop {
///     let events = reader.read_live(user_id, &last_id, 5000).await?;
///
///     if events.is_empty() {
///         // Timeout, no new events
///         continue;
///     }
///
///     for (stream_id, event) in events {
///         println!("Inbox event: {}", event.kind.as_str());
///         last_id = stream_id;
///     }
/// }
/// # Ok(())
/// # }
/// ```
use crate::events::serialization::{
    deserialize_notification_event, inbox_stream_key, SerializationError,
};
use crate::events::NotificationEvent;
use crate::redis::client::RedisClient;
use redis::{streams::StreamReadOptions, streams::StreamReadReply, AsyncCommands};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Stream reader errors
#[derive(Error, Debug)]
pub enum StreamReaderError {
    /// Raw Redis error
    #[error("Redis command error: {0}")]
    CommandError(#[from] redis::RedisError),

    /// Serialization error
    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] SerializationError),
}

/// Configuration for stream reader behavior
#[derive(Debug, Clone)]
pub struct StreamReaderConfig {
    /// Default batch size for backfill operations
    pub default_batch_size: usize,

    /// Default timeout for live reads in milliseconds
    pub default_live_timeout_ms: usize,

    /// Maximum batch size to prevent memory issues
    pub max_batch_size: usize,
}

impl Default for StreamReaderConfig {
    fn default() -> Self {
        Self {
            default_batch_size: 1000,
            default_live_timeout_ms: 5000,
            max_batch_size: 10000,
        }
    }
}

/// Redis Stream reader for consuming inbox events
///
/// Provides both backfill (historical) and live tail (real-time) reading.
#[derive(Clone)]
pub struct StreamReader {
    client: RedisClient,
    config: StreamReaderConfig,
}

impl StreamReader {
    /// Creates a new stream reader with default configuration
    pub fn new(client: RedisClient) -> Self {
        Self {
            client,
            config: StreamReaderConfig::default(),
        }
    }

    /// Creates a new stream reader with custom configuration
    pub fn with_config(client: RedisClient, config: StreamReaderConfig) -> Self {
        Self { client, config }
    }

    /// Returns the configured default timeout for live reads
    pub fn default_live_timeout_ms(&self) -> usize {
        self.config.default_live_timeout_ms
    }

    /// Reads historical events (backfill) from a user's inbox stream
    ///
    /// Uses XREAD with COUNT to fetch a batch of historical events.
    /// This is non-blocking and returns immediately.
    ///
    /// # Arguments
    ///
    /// * `user_id` - Recipient whose inbox stream to read
    /// * `since_id` - Stream ID to start from (use "0" for beginning, or last known ID)
    /// * `count` - Maximum number of events to fetch
    ///
    /// # Returns
    ///
    /// Vector of (stream_id, event) tuples in chronological order.
    /// Returns empty vector if no events found.
    ///
    /// # Special Stream IDs
    ///
    /// - `"0"` - Read from the beginning of the stream
    /// - `"$"` - Read from the end (typically returns empty for backfill)
    /// - `"{timestamp}-{sequence}"` - Read from specific position
    pub async fn read_backfill(
        &self,
        user_id: Uuid,
        since_id: &str,
        count: usize,
    ) -> Result<Vec<(String, NotificationEvent)>, StreamReaderError> {
        // Enforce max batch size
        let safe_count = std::cmp::min(count, self.config.max_batch_size);

        let stream_key = inbox_stream_key(user_id);
        let mut conn = self.client.get_connection();

        // Execute XREAD with COUNT
        let opts = StreamReadOptions::default().count(safe_count);
        let reply: StreamReadReply = conn
            .xread_options(&[&stream_key], &[since_id], &opts)
            .await?;

        let events = collect_events(reply, user_id);

        tracing::debug!(
            user_id = %user_id,
            since_id = %since_id,
            count = safe_count,
            fetched = events.len(),
            "Backfilled events from inbox stream"
        );

        Ok(events)
    }

    /// Reads new events in real-time (live tail) with blocking
    ///
    /// Uses XREAD BLOCK to wait for new events. This blocks up to the
    /// specified timeout, so callers driving a subscription should wrap it
    /// in a cancellable loop.
    ///
    /// # Arguments
    ///
    /// * `user_id` - Recipient whose inbox stream to read
    /// * `after_id` - Stream ID to read after (use "$" for latest, or last known ID)
    /// * `timeout_ms` - Block timeout in milliseconds (0 = infinite, not recommended)
    ///
    /// # Returns
    ///
    /// Vector of (stream_id, event) tuples for new events.
    /// Returns empty vector if timeout expires with no new events.
    pub async fn read_live(
        &self,
        user_id: Uuid,
        after_id: &str,
        timeout_ms: usize,
    ) -> Result<Vec<(String, NotificationEvent)>, StreamReaderError> {
        let stream_key = inbox_stream_key(user_id);
        let mut conn = self.client.get_connection();

        // Execute XREAD BLOCK
        let opts = StreamReadOptions::default()
            .count(self.config.default_batch_size)
            .block(timeout_ms);

        let reply: StreamReadReply = conn
            .xread_options(&[&stream_key], &[after_id], &opts)
            .await?;

        let events = collect_events(reply, user_id);

        if !events.is_empty() {
            tracing::debug!(
                user_id = %user_id,
                after_id = %after_id,
                count = events.len(),
                "Received live inbox events"
            );
        }

        Ok(events)
    }

    /// Counts total number of entries in a user's inbox stream
    pub async fn count_entries(&self, user_id: Uuid) -> Result<usize, StreamReaderError> {
        let stream_key = inbox_stream_key(user_id);
        let mut conn = self.client.get_connection();

        let count: usize = conn.xlen(&stream_key).await?;

        Ok(count)
    }
}

/// Converts a raw XREAD reply into deserialized events
///
/// Entries that fail to deserialize are logged and skipped so one corrupt
/// entry cannot wedge a subscription.
fn collect_events(reply: StreamReadReply, user_id: Uuid) -> Vec<(String, NotificationEvent)> {
    let mut events = Vec::new();

    for stream_key_result in reply.keys {
        for stream_id_result in stream_key_result.ids {
            let stream_id = stream_id_result.id;

            // Convert Redis map to HashMap<String, String>
            let fields: HashMap<String, String> = stream_id_result
                .map
                .into_iter()
                .filter_map(|(k, v)| {
                    let value = redis::from_redis_value::<String>(&v).ok()?;
                    Some((k, value))
                })
                .collect();

            match deserialize_notification_event(&fields) {
                Ok(event) => events.push((stream_id, event)),
                Err(e) => {
                    tracing::error!(
                        user_id = %user_id,
                        stream_id = %stream_id,
                        error = %e,
                        "Failed to deserialize inbox event, skipping"
                    );
                }
            }
        }
    }

    events
}
