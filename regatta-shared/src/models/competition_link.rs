//! Team-competition participation links
//!
//! Link status is independent of team status: a team may be approved for
//! one competition while still pending another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Link status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "link_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Pending,
    Approved,
    Rejected,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Pending => "pending",
            LinkStatus::Approved => "approved",
            LinkStatus::Rejected => "rejected",
        }
    }
}

/// Participation link row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamCompetitionLink {
    /// Team ID
    pub team_id: Uuid,

    /// Competition ID
    pub competition_id: Uuid,

    /// Link status
    pub status: LinkStatus,

    /// Who submitted the team (nullable if profile removed)
    pub submitted_by: Option<Uuid>,

    /// When the link was created
    pub created_at: DateTime<Utc>,

    /// When the link was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLink {
    pub team_id: Uuid,
    pub competition_id: Uuid,
    pub status: LinkStatus,
    pub submitted_by: Option<Uuid>,
}

impl TeamCompetitionLink {
    /// Creates a link row
    pub async fn create(pool: &PgPool, data: CreateLink) -> Result<Self, sqlx::Error> {
        let link = sqlx::query_as::<_, TeamCompetitionLink>(
            r#"
            INSERT INTO team_competition_links (team_id, competition_id, status, submitted_by)
            VALUES ($1, $2, $3, $4)
            RETURNING team_id, competition_id, status, submitted_by, created_at, updated_at
            "#,
        )
        .bind(data.team_id)
        .bind(data.competition_id)
        .bind(data.status)
        .bind(data.submitted_by)
        .fetch_one(pool)
        .await?;

        Ok(link)
    }

    /// Finds a link by its composite key
    pub async fn find(
        pool: &PgPool,
        team_id: Uuid,
        competition_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let link = sqlx::query_as::<_, TeamCompetitionLink>(
            r#"
            SELECT team_id, competition_id, status, submitted_by, created_at, updated_at
            FROM team_competition_links
            WHERE team_id = $1 AND competition_id = $2
            "#,
        )
        .bind(team_id)
        .bind(competition_id)
        .fetch_optional(pool)
        .await?;

        Ok(link)
    }

    /// Moves a link out of `pending` with a precondition guard
    pub async fn resolve(
        pool: &PgPool,
        team_id: Uuid,
        competition_id: Uuid,
        status: LinkStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let link = sqlx::query_as::<_, TeamCompetitionLink>(
            r#"
            UPDATE team_competition_links
            SET status = $3, updated_at = NOW()
            WHERE team_id = $1 AND competition_id = $2 AND status = 'pending'
            RETURNING team_id, competition_id, status, submitted_by, created_at, updated_at
            "#,
        )
        .bind(team_id)
        .bind(competition_id)
        .bind(status)
        .fetch_optional(pool)
        .await?;

        Ok(link)
    }

    /// Lists all links for a competition
    pub async fn list_by_competition(
        pool: &PgPool,
        competition_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let links = sqlx::query_as::<_, TeamCompetitionLink>(
            r#"
            SELECT team_id, competition_id, status, submitted_by, created_at, updated_at
            FROM team_competition_links
            WHERE competition_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(competition_id)
        .fetch_all(pool)
        .await?;

        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_status_as_str() {
        assert_eq!(LinkStatus::Pending.as_str(), "pending");
        assert_eq!(LinkStatus::Approved.as_str(), "approved");
        assert_eq!(LinkStatus::Rejected.as_str(), "rejected");
    }
}
