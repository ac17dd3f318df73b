//! Team roster model
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE team_role AS ENUM ('captain', 'member');
//!
//! CREATE TABLE team_members (
//!     team_id UUID NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
//!     user_id UUID NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
//!     class TEXT NOT NULL,
//!     role team_role NOT NULL DEFAULT 'member',
//!     joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (team_id, user_id)
//! );
//! ```
//!
//! A partial unique index on `(team_id) WHERE role = 'captain'` keeps the
//! captain unique per team.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Roster role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "team_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    /// Team creator; moderates join requests
    Captain,

    /// Regular roster member
    Member,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Captain => "captain",
            TeamRole::Member => "member",
        }
    }
}

/// Roster row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    /// Team ID
    pub team_id: Uuid,

    /// Member's profile ID
    pub user_id: Uuid,

    /// Class slot the member fills
    pub class: String,

    /// Roster role
    pub role: TeamRole,

    /// When the member joined
    pub joined_at: DateTime<Utc>,
}

impl TeamMember {
    /// Finds a specific roster row
    pub async fn find(
        pool: &PgPool,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let member = sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT team_id, user_id, class, role, joined_at
            FROM team_members
            WHERE team_id = $1 AND user_id = $2
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(member)
    }

    /// Finds the team's captain
    pub async fn find_captain(pool: &PgPool, team_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let captain = sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT team_id, user_id, class, role, joined_at
            FROM team_members
            WHERE team_id = $1 AND role = 'captain'
            "#,
        )
        .bind(team_id)
        .fetch_optional(pool)
        .await?;

        Ok(captain)
    }

    /// Lists the full roster, captain first
    pub async fn list_by_team(pool: &PgPool, team_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let members = sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT team_id, user_id, class, role, joined_at
            FROM team_members
            WHERE team_id = $1
            ORDER BY role ASC, joined_at ASC
            "#,
        )
        .bind(team_id)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }

    /// Counts roster rows for a team
    pub async fn count_by_team(pool: &PgPool, team_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM team_members WHERE team_id = $1")
                .bind(team_id)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }
}
