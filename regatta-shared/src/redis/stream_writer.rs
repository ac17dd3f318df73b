//! Redis Stream writer for publishing notification events
//!
//! Events are written with XADD to the recipient's inbox stream, with
//! exponential-backoff retry on transient failures.
//!
//! # Example
//!
//! ```no_run
//! use regatta_shared::events::{NotificationEvent, NotificationEventKind};
//! use regatta_shared::redis::client::{RedisClient, RedisConfig};
//! use regatta_shared::redis::stream_writer::StreamWriter;
//!
//! # async fn example(event: &NotificationEvent) -> anyhow::Result<()> {
//! let config = RedisConfig::from_env()?;
//! let client = RedisClient::new(config).await?;
//! let writer = StreamWriter::new(client);
//!
//! let stream_id = writer.publish(event).await?;
//! println!("Published with stream ID: {}", stream_id);
//! # Ok(())
//! # }
//! ```

use crate::events::serialization::{
    inbox_stream_key, serialize_notification_event, SerializationError,
};
use crate::events::NotificationEvent;
use crate::redis::client::{RedisClient, RedisClientError};
use redis::AsyncCommands;
use thiserror::Error;

/// Stream writer errors
#[derive(Error, Debug)]
pub enum StreamWriterError {
    /// Redis client error
    #[error("Redis error: {0}")]
    RedisError(#[from] RedisClientError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerializationError),

    /// Write failed after retries
    #[error("Failed to write event after {attempts} attempts: {last_error}")]
    WriteFailed { attempts: u32, last_error: String },
}

/// Retry behavior for the writer
#[derive(Debug, Clone)]
pub struct StreamWriterConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,

    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
}

impl Default for StreamWriterConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 100,
            max_retry_delay_ms: 5000,
        }
    }
}

/// Publishes notification events to per-recipient Redis Streams
#[derive(Clone)]
pub struct StreamWriter {
    client: RedisClient,
    config: StreamWriterConfig,
}

impl StreamWriter {
    /// Creates a writer with default retry configuration
    pub fn new(client: RedisClient) -> Self {
        Self {
            client,
            config: StreamWriterConfig::default(),
        }
    }

    /// Creates a writer with custom retry configuration
    pub fn with_config(client: RedisClient, config: StreamWriterConfig) -> Self {
        Self { client, config }
    }

    /// Publishes an event to the recipient's inbox stream.
    ///
    /// # Returns
    ///
    /// The Redis Stream entry ID ("timestamp-sequence").
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or XADD keeps failing after
    /// retries.
    pub async fn publish(&self, event: &NotificationEvent) -> Result<String, StreamWriterError> {
        let fields = serialize_notification_event(event)?;
        let stream_key = inbox_stream_key(event.notification.to_user);

        let stream_id = self
            .xadd_with_retry(&stream_key, &fields)
            .await
            .map_err(|e| StreamWriterError::WriteFailed {
                attempts: self.config.max_retries + 1,
                last_error: e.to_string(),
            })?;

        tracing::debug!(
            to_user = %event.notification.to_user,
            notification_id = %event.notification.id,
            event = event.kind.as_str(),
            stream_id = %stream_id,
            "Published notification event"
        );

        Ok(stream_id)
    }

    async fn xadd_with_retry(
        &self,
        stream_key: &str,
        fields: &std::collections::HashMap<String, String>,
    ) -> Result<String, redis::RedisError> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.config.max_retries {
            let mut conn = self.client.get_connection();

            let items: Vec<(&str, &str)> = fields
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();

            match conn.xadd(stream_key, "*", &items).await {
                Ok(stream_id) => return Ok(stream_id),
                Err(e) => {
                    last_error = Some(e);
                    attempt += 1;

                    if attempt <= self.config.max_retries {
                        let delay_ms = std::cmp::min(
                            self.config.base_retry_delay_ms * 2u64.pow(attempt - 1),
                            self.config.max_retry_delay_ms,
                        );

                        tracing::warn!(
                            stream_key = %stream_key,
                            attempt = attempt,
                            delay_ms = delay_ms,
                            "XADD failed, retrying..."
                        );

                        tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap())
    }
}
