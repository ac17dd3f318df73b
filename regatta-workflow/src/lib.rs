//! # Regatta Workflow Library
//!
//! This library implements the moderation workflow core: a pure decision
//! engine over entity snapshots, an orchestrator that turns decisions into
//! guarded state writes and notifications, and the notification channel
//! port with its live (Postgres + Redis) and in-memory adapters.
//!
//! ## Modules
//!
//! - `intent`: Workflow intents and moderation record metadata
//! - `engine`: Pure decision logic (`decide`)
//! - `orchestrator`: Intent execution with idempotent resolution
//! - `store`: Entity store port and the PostgreSQL adapter
//! - `channel`: Notification channel port and the live adapter
//! - `memory`: In-memory doubles for tests and demos
//! - `inbox`: Client-side inbox cache fed by reconcile + events
//! - `error`: The workflow error taxonomy
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use regatta_workflow::{MemoryChannel, MemoryStore, WorkflowIntent, WorkflowOrchestrator};
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), regatta_workflow::WorkflowError> {
//! let store = Arc::new(MemoryStore::new());
//! let channel = Arc::new(MemoryChannel::new());
//! let orchestrator = WorkflowOrchestrator::new(store, channel);
//!
//! let intent = WorkflowIntent::JoinTeam {
//!     team_id: Uuid::new_v4(),
//!     user_id: Uuid::new_v4(),
//! };
//! let effect = orchestrator.execute(intent).await?;
//! println!("Effect: {:?}", effect);
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod engine;
pub mod error;
pub mod inbox;
pub mod intent;
pub mod memory;
pub mod orchestrator;
pub mod store;

pub use channel::{ChannelError, LiveChannel, NotificationChannel, Subscription};
pub use engine::{decide, Decision, DenyReason, EngineContext, RewardGrant, StateEffect};
pub use error::{FailedDelivery, WorkflowError};
pub use inbox::InboxCache;
pub use intent::{ModerationAction, WorkflowIntent};
pub use memory::{MemoryChannel, MemoryStore};
pub use orchestrator::{Effect, OrchestratorConfig, WorkflowOrchestrator};
pub use store::{EntityStore, PgEntityStore, StoreError};
