//! Redis integration for notification push
//!
//! Each recipient has one Redis Stream (`inbox:{user_id}`) mirroring every
//! insert, update, and delete of their notifications:
//!
//! ```text
//! ┌──────────────┐
//! │ Orchestrator │ ──row write──> PostgreSQL (durable truth)
//! └──────────────┘
//!        │
//!        │ XADD
//!        ▼
//!   inbox:{user_id}
//!        │
//!        │ XREAD BLOCK
//!        ▼
//! ┌──────────────┐
//! │  Subscriber  │ ──reconcile on connect──> notifications table
//! └──────────────┘
//! ```
//!
//! The stream is a best-effort push channel, not the source of truth:
//! subscribers reconcile from the database on (re)connect.

pub mod client;
pub mod stream_reader;
pub mod stream_writer;

pub use client::{RedisClient, RedisClientError, RedisConfig};
pub use stream_reader::{StreamReader, StreamReaderConfig, StreamReaderError};
pub use stream_writer::{StreamWriter, StreamWriterConfig, StreamWriterError};
