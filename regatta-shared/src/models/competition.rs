//! Competition model and database operations
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE competition_kind AS ENUM ('open', 'regional', 'federal');
//! CREATE TYPE competition_status AS ENUM ('upcoming', 'ongoing', 'completed');
//!
//! CREATE TABLE competitions (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     name TEXT NOT NULL,
//!     kind competition_kind NOT NULL,
//!     status competition_status NOT NULL DEFAULT 'upcoming',
//!     max_team_members INTEGER NOT NULL DEFAULT 8,
//!     regional_admin_id UUID REFERENCES profiles(id) ON DELETE SET NULL,
//!     federal_admin_id UUID REFERENCES profiles(id) ON DELETE SET NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//!
//! CREATE TABLE competition_regions (
//!     competition_id UUID NOT NULL REFERENCES competitions(id) ON DELETE CASCADE,
//!     region INTEGER NOT NULL,
//!     PRIMARY KEY (competition_id, region)
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Competition kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "competition_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CompetitionKind {
    /// No moderation gate
    Open,

    /// Teams enter via regional admin approval
    Regional,

    /// Teams are forwarded by regional admins and approved federally
    Federal,
}

impl CompetitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompetitionKind::Open => "open",
            CompetitionKind::Regional => "regional",
            CompetitionKind::Federal => "federal",
        }
    }
}

/// Competition lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "competition_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CompetitionStatus {
    Upcoming,
    Ongoing,
    Completed,
}

impl CompetitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompetitionStatus::Upcoming => "upcoming",
            CompetitionStatus::Ongoing => "ongoing",
            CompetitionStatus::Completed => "completed",
        }
    }
}

/// Competition model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Competition {
    /// Unique competition ID
    pub id: Uuid,

    /// Competition name
    pub name: String,

    /// Moderation kind
    pub kind: CompetitionKind,

    /// Lifecycle status
    pub status: CompetitionStatus,

    /// Roster size cap enforced at submission
    pub max_team_members: i32,

    /// Regional admin who moderates submissions (nullable if unassigned)
    pub regional_admin_id: Option<Uuid>,

    /// Federal admin owning the competition (nullable if unassigned)
    pub federal_admin_id: Option<Uuid>,

    /// When the competition was created
    pub created_at: DateTime<Utc>,

    /// When the competition was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new competition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCompetition {
    /// Competition name
    pub name: String,

    /// Moderation kind
    pub kind: CompetitionKind,

    /// Roster size cap (defaults to 8)
    #[serde(default = "default_max_team_members")]
    pub max_team_members: i32,

    /// Regional admin assignment
    pub regional_admin_id: Option<Uuid>,

    /// Federal admin assignment
    pub federal_admin_id: Option<Uuid>,

    /// Eligible regions (regional competitions)
    #[serde(default)]
    pub regions: Vec<i32>,
}

fn default_max_team_members() -> i32 {
    8
}

impl Competition {
    /// Creates a competition and its eligible-region rows in one transaction
    pub async fn create(pool: &PgPool, data: CreateCompetition) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let competition = sqlx::query_as::<_, Competition>(
            r#"
            INSERT INTO competitions (name, kind, max_team_members, regional_admin_id, federal_admin_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, kind, status, max_team_members,
                      regional_admin_id, federal_admin_id, created_at, updated_at
            "#,
        )
        .bind(data.name)
        .bind(data.kind)
        .bind(data.max_team_members)
        .bind(data.regional_admin_id)
        .bind(data.federal_admin_id)
        .fetch_one(&mut *tx)
        .await?;

        for region in &data.regions {
            sqlx::query(
                "INSERT INTO competition_regions (competition_id, region) VALUES ($1, $2)",
            )
            .bind(competition.id)
            .bind(region)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(competition)
    }

    /// Finds a competition by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let competition = sqlx::query_as::<_, Competition>(
            r#"
            SELECT id, name, kind, status, max_team_members,
                   regional_admin_id, federal_admin_id, created_at, updated_at
            FROM competitions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(competition)
    }

    /// Lists the eligible regions for a competition
    pub async fn list_regions(pool: &PgPool, id: Uuid) -> Result<Vec<i32>, sqlx::Error> {
        let regions: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT region FROM competition_regions
            WHERE competition_id = $1
            ORDER BY region ASC
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        Ok(regions)
    }
}
