//! # Regatta Shared Library
//!
//! This crate contains shared types, utilities, and data access used across
//! the Regatta workflow core and API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `db`: Connection pooling and migrations
//! - `events`: Notification event serialization for Redis Streams
//! - `mentions`: Entity mention micro-format for notification content
//! - `redis`: Redis client and stream utilities

pub mod db;
pub mod events;
pub mod mentions;
pub mod models;
pub mod redis;

/// Current version of the Regatta shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
