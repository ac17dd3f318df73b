//! Team model and database operations
//!
//! Teams are the unit of moderation: the status machine below tracks a
//! team's progress through regional and federal approval.
//!
//! # State Machine
//!
//! ```text
//! forming → pending → approved_regional → pending_federal → approved_federal
//!                   → rejected
//! ```
//!
//! `pending` is entered when the captain submits the team to a regional
//! competition. Only rejection of that submission produces `rejected`;
//! a rejected federal submission leaves teams at `pending_federal` so the
//! regional admin can resubmit. `rejected` and `approved_federal` are
//! terminal.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE team_status AS ENUM (
//!     'forming', 'pending', 'approved_regional', 'rejected',
//!     'pending_federal', 'approved_federal'
//! );
//!
//! CREATE TABLE teams (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     name TEXT NOT NULL,
//!     region INTEGER NOT NULL,
//!     status team_status NOT NULL DEFAULT 'forming',
//!     max_members INTEGER NOT NULL DEFAULT 8,
//!     required_classes TEXT[] NOT NULL DEFAULT '{}',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! `required_classes` is a multiset: duplicates are legal, and admitting a
//! member consumes exactly one occurrence of their class.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Team moderation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "team_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TeamStatus {
    /// Roster is open; members can request to join
    Forming,

    /// Submitted to a regional competition, awaiting the regional admin
    Pending,

    /// Accepted into a regional competition
    ApprovedRegional,

    /// Regional submission rejected
    Rejected,

    /// Forwarded to federal moderation, awaiting a federation admin
    PendingFederal,

    /// Accepted at the federal level
    ApprovedFederal,
}

impl TeamStatus {
    /// Converts status to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamStatus::Forming => "forming",
            TeamStatus::Pending => "pending",
            TeamStatus::ApprovedRegional => "approved_regional",
            TeamStatus::Rejected => "rejected",
            TeamStatus::PendingFederal => "pending_federal",
            TeamStatus::ApprovedFederal => "approved_federal",
        }
    }

    /// Checks if the status is terminal (no further transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TeamStatus::Rejected | TeamStatus::ApprovedFederal)
    }

    /// Checks if transition to the target status is valid
    pub fn can_transition_to(&self, target: TeamStatus) -> bool {
        match (self, target) {
            (TeamStatus::Forming, TeamStatus::Pending) => true,

            (TeamStatus::Pending, TeamStatus::ApprovedRegional) => true,
            (TeamStatus::Pending, TeamStatus::Rejected) => true,

            (TeamStatus::ApprovedRegional, TeamStatus::PendingFederal) => true,

            // Resubmission after a federal rejection re-parks the team
            (TeamStatus::PendingFederal, TeamStatus::PendingFederal) => true,
            (TeamStatus::PendingFederal, TeamStatus::ApprovedFederal) => true,

            _ => false,
        }
    }
}

/// Team model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    /// Unique team ID
    pub id: Uuid,

    /// Team name
    pub name: String,

    /// Home region number
    pub region: i32,

    /// Current moderation status
    pub status: TeamStatus,

    /// Roster capacity including the captain
    pub max_members: i32,

    /// Remaining class slots to fill (multiset)
    pub required_classes: Vec<String>,

    /// When the team was created
    pub created_at: DateTime<Utc>,

    /// When the team was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTeam {
    /// Team name
    pub name: String,

    /// Home region number
    pub region: i32,

    /// Roster capacity (defaults to 8)
    #[serde(default = "default_max_members")]
    pub max_members: i32,

    /// Class slots to fill
    #[serde(default)]
    pub required_classes: Vec<String>,
}

fn default_max_members() -> i32 {
    8
}

impl Team {
    /// Creates a team with its captain's roster row in one transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the captain profile does not exist or the
    /// database operation fails.
    pub async fn create(
        pool: &PgPool,
        data: CreateTeam,
        captain_id: Uuid,
        captain_class: &str,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let team = sqlx::query_as::<_, Team>(
            r#"
            INSERT INTO teams (name, region, max_members, required_classes)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, region, status, max_members, required_classes,
                      created_at, updated_at
            "#,
        )
        .bind(data.name)
        .bind(data.region)
        .bind(data.max_members)
        .bind(data.required_classes)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO team_members (team_id, user_id, class, role)
            VALUES ($1, $2, $3, 'captain')
            "#,
        )
        .bind(team.id)
        .bind(captain_id)
        .bind(captain_class)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(team)
    }

    /// Finds a team by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let team = sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, region, status, max_members, required_classes,
                   created_at, updated_at
            FROM teams
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(team)
    }

    /// Fetches several teams at once
    pub async fn list_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        let teams = sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, region, status, max_members, required_classes,
                   created_at, updated_at
            FROM teams
            WHERE id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;

        Ok(teams)
    }

    /// Transitions a team's status with a precondition guard
    ///
    /// The update only applies if the team is still in `from`; a `None`
    /// return means the precondition no longer held.
    pub async fn transition_status(
        pool: &PgPool,
        id: Uuid,
        from: TeamStatus,
        to: TeamStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let team = sqlx::query_as::<_, Team>(
            r#"
            UPDATE teams
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING id, name, region, status, max_members, required_classes,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(pool)
        .await?;

        Ok(team)
    }
}
