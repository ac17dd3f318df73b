//! Database layer
//!
//! Connection pooling and migrations. Entity models live in the
//! `models` module at crate root level.

pub mod migrations;
pub mod pool;

pub use migrations::run_migrations;
pub use pool::{create_pool, health_check, DatabaseConfig};
