//! Database models
//!
//! One module per entity, each with its CRUD operations over a `PgPool`.
//! Multi-statement workflow effects (admitting a member, approving a
//! federal submission) do not live here: those run as single transactions
//! owned by the workflow store.
//!
//! # Models
//!
//! - `profile`: User profiles with roles
//! - `team`: Teams with a moderation status machine
//! - `team_member`: Team rosters (captain + members)
//! - `competition`: Competitions and their eligible regions
//! - `competition_link`: Team participation in competitions
//! - `notification`: Notifications, doubling as moderation records
//! - `reward`: Rewards distributed to users

pub mod competition;
pub mod competition_link;
pub mod notification;
pub mod profile;
pub mod reward;
pub mod team;
pub mod team_member;

pub use competition::{Competition, CompetitionKind, CompetitionStatus, CreateCompetition};
pub use competition_link::{CreateLink, LinkStatus, TeamCompetitionLink};
pub use notification::{CreateNotification, Notification, NotificationKind};
pub use profile::{CreateProfile, Profile, UserRole};
pub use reward::{CreateReward, Reward, RewardKind};
pub use team::{CreateTeam, Team, TeamStatus};
pub use team_member::{TeamMember, TeamRole};
