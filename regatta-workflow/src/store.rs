//! Entity store port and Postgres implementation
//!
//! [`EntityStore`] is the orchestrator's view of durable state: plain
//! reads for building an [`crate::engine::EngineContext`], plus a single
//! [`EntityStore::apply`] that executes a [`StateEffect`] as one
//! transaction. Every write carries its precondition in the WHERE clause;
//! a guard that matches zero rows surfaces as
//! [`StoreError::StaleTransition`] and rolls the transaction back, so an
//! effect either lands whole or not at all.

use async_trait::async_trait;
use regatta_shared::models::{
    Competition, LinkStatus, Profile, Team, TeamCompetitionLink, TeamMember, TeamStatus, UserRole,
};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::engine::{RewardGrant, StateEffect};

/// Entity store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write guard matched zero rows; concurrent state won the race
    #[error("state changed before the update could apply: {0}")]
    StaleTransition(&'static str),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read and write access the orchestrator needs
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError>;

    async fn list_profiles_by_role(&self, role: UserRole) -> Result<Vec<Profile>, StoreError>;

    async fn get_team(&self, id: Uuid) -> Result<Option<Team>, StoreError>;

    async fn get_teams(&self, ids: &[Uuid]) -> Result<Vec<Team>, StoreError>;

    async fn get_team_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMember>, StoreError>;

    async fn get_team_captain(&self, team_id: Uuid) -> Result<Option<TeamMember>, StoreError>;

    async fn list_team_members(&self, team_id: Uuid) -> Result<Vec<TeamMember>, StoreError>;

    async fn count_team_members(&self, team_id: Uuid) -> Result<i64, StoreError>;

    async fn get_competition(&self, id: Uuid) -> Result<Option<Competition>, StoreError>;

    async fn list_competition_regions(&self, id: Uuid) -> Result<Vec<i32>, StoreError>;

    async fn get_link(
        &self,
        team_id: Uuid,
        competition_id: Uuid,
    ) -> Result<Option<TeamCompetitionLink>, StoreError>;

    /// Applies a state effect as a single transaction
    async fn apply(&self, effect: &StateEffect) -> Result<(), StoreError>;
}

/// Postgres-backed entity store
#[derive(Clone)]
pub struct PgEntityStore {
    db: PgPool,
}

impl PgEntityStore {
    pub fn new(db: PgPool) -> Self {
        PgEntityStore { db }
    }

    /// Consumes one class slot and inserts the roster row
    ///
    /// The slot splice and the roster insert guard each other: the UPDATE
    /// only fires while the team is forming, the class is still required
    /// and the roster has room, and the INSERT only fires if the user is
    /// not already on the roster. Either guard failing rolls both back.
    async fn admit_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        class: &str,
    ) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;

        let spliced = sqlx::query(
            r#"
            UPDATE teams
            SET required_classes =
                    required_classes[1:array_position(required_classes, $2) - 1]
                    || required_classes[array_position(required_classes, $2) + 1:],
                updated_at = NOW()
            WHERE id = $1
              AND status = 'forming'
              AND $2 = ANY(required_classes)
              AND (SELECT COUNT(*) FROM team_members WHERE team_id = $1) < max_members
            "#,
        )
        .bind(team_id)
        .bind(class)
        .execute(&mut *tx)
        .await?;

        if spliced.rows_affected() == 0 {
            return Err(StoreError::StaleTransition(
                "class slot is no longer available",
            ));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO team_members (team_id, user_id, class, role)
            VALUES ($1, $2, $3, 'member')
            ON CONFLICT (team_id, user_id) DO NOTHING
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(class)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(StoreError::StaleTransition("user is already on the roster"));
        }

        tx.commit().await?;

        Ok(())
    }

    async fn submit_regional(
        &self,
        team_id: Uuid,
        competition_id: Uuid,
        captain_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;

        let moved = sqlx::query(
            r#"
            UPDATE teams
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            "#,
        )
        .bind(team_id)
        .bind(TeamStatus::Pending)
        .bind(TeamStatus::Forming)
        .execute(&mut *tx)
        .await?;

        if moved.rows_affected() == 0 {
            return Err(StoreError::StaleTransition("team is no longer forming"));
        }

        let linked = sqlx::query(
            r#"
            INSERT INTO team_competition_links (team_id, competition_id, status, submitted_by)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (team_id, competition_id) DO NOTHING
            "#,
        )
        .bind(team_id)
        .bind(competition_id)
        .bind(LinkStatus::Pending)
        .bind(captain_id)
        .execute(&mut *tx)
        .await?;

        if linked.rows_affected() == 0 {
            return Err(StoreError::StaleTransition(
                "team was already submitted to this competition",
            ));
        }

        tx.commit().await?;

        Ok(())
    }

    async fn resolve_regional(
        &self,
        team_id: Uuid,
        competition_id: Uuid,
        team_status: TeamStatus,
        link_status: LinkStatus,
    ) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;

        let moved = sqlx::query(
            r#"
            UPDATE teams
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            "#,
        )
        .bind(team_id)
        .bind(team_status)
        .bind(TeamStatus::Pending)
        .execute(&mut *tx)
        .await?;

        if moved.rows_affected() == 0 {
            return Err(StoreError::StaleTransition("team is no longer pending"));
        }

        let resolved = sqlx::query(
            r#"
            UPDATE team_competition_links
            SET status = $3, updated_at = NOW()
            WHERE team_id = $1 AND competition_id = $2 AND status = $4
            "#,
        )
        .bind(team_id)
        .bind(competition_id)
        .bind(link_status)
        .bind(LinkStatus::Pending)
        .execute(&mut *tx)
        .await?;

        if resolved.rows_affected() == 0 {
            return Err(StoreError::StaleTransition(
                "submission was already resolved",
            ));
        }

        tx.commit().await?;

        Ok(())
    }

    /// Parks every listed team at `pending_federal` in one statement
    ///
    /// Teams already at `pending_federal` pass the guard too, which is what
    /// makes resubmission after a federal rejection work.
    async fn submit_federal(&self, team_ids: &[Uuid]) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;

        let moved: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE teams
            SET status = $2, updated_at = NOW()
            WHERE id = ANY($1) AND (status = $3 OR status = $2)
            RETURNING id
            "#,
        )
        .bind(team_ids)
        .bind(TeamStatus::PendingFederal)
        .bind(TeamStatus::ApprovedRegional)
        .fetch_all(&mut *tx)
        .await?;

        if moved.len() != team_ids.len() {
            return Err(StoreError::StaleTransition(
                "one or more teams are not eligible",
            ));
        }

        tx.commit().await?;

        Ok(())
    }

    async fn approve_federal(
        &self,
        competition_id: Uuid,
        team_ids: &[Uuid],
    ) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;

        let moved: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE teams
            SET status = $2, updated_at = NOW()
            WHERE id = ANY($1) AND status = $3
            RETURNING id
            "#,
        )
        .bind(team_ids)
        .bind(TeamStatus::ApprovedFederal)
        .bind(TeamStatus::PendingFederal)
        .fetch_all(&mut *tx)
        .await?;

        if moved.len() != team_ids.len() {
            return Err(StoreError::StaleTransition(
                "one or more teams already left federal review",
            ));
        }

        for team_id in team_ids {
            sqlx::query(
                r#"
                INSERT INTO team_competition_links (team_id, competition_id, status)
                VALUES ($1, $2, $3)
                ON CONFLICT (team_id, competition_id)
                DO UPDATE SET status = EXCLUDED.status, updated_at = NOW()
                "#,
            )
            .bind(team_id)
            .bind(competition_id)
            .bind(LinkStatus::Approved)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn grant_rewards(&self, grants: &[RewardGrant]) -> Result<(), StoreError> {
        let mut tx = self.db.begin().await?;

        for grant in grants {
            sqlx::query(
                r#"
                INSERT INTO rewards (user_id, kind, value, competition_id)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(grant.user_id)
            .bind(grant.kind)
            .bind(&grant.value)
            .bind(grant.competition_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        Ok(Profile::find_by_id(&self.db, id).await?)
    }

    async fn list_profiles_by_role(&self, role: UserRole) -> Result<Vec<Profile>, StoreError> {
        Ok(Profile::list_by_role(&self.db, role).await?)
    }

    async fn get_team(&self, id: Uuid) -> Result<Option<Team>, StoreError> {
        Ok(Team::find_by_id(&self.db, id).await?)
    }

    async fn get_teams(&self, ids: &[Uuid]) -> Result<Vec<Team>, StoreError> {
        Ok(Team::list_by_ids(&self.db, ids).await?)
    }

    async fn get_team_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMember>, StoreError> {
        Ok(TeamMember::find(&self.db, team_id, user_id).await?)
    }

    async fn get_team_captain(&self, team_id: Uuid) -> Result<Option<TeamMember>, StoreError> {
        Ok(TeamMember::find_captain(&self.db, team_id).await?)
    }

    async fn list_team_members(&self, team_id: Uuid) -> Result<Vec<TeamMember>, StoreError> {
        Ok(TeamMember::list_by_team(&self.db, team_id).await?)
    }

    async fn count_team_members(&self, team_id: Uuid) -> Result<i64, StoreError> {
        Ok(TeamMember::count_by_team(&self.db, team_id).await?)
    }

    async fn get_competition(&self, id: Uuid) -> Result<Option<Competition>, StoreError> {
        Ok(Competition::find_by_id(&self.db, id).await?)
    }

    async fn list_competition_regions(&self, id: Uuid) -> Result<Vec<i32>, StoreError> {
        Ok(Competition::list_regions(&self.db, id).await?)
    }

    async fn get_link(
        &self,
        team_id: Uuid,
        competition_id: Uuid,
    ) -> Result<Option<TeamCompetitionLink>, StoreError> {
        Ok(TeamCompetitionLink::find(&self.db, team_id, competition_id).await?)
    }

    async fn apply(&self, effect: &StateEffect) -> Result<(), StoreError> {
        match effect {
            StateEffect::AdmitMember {
                team_id,
                user_id,
                class,
            } => self.admit_member(*team_id, *user_id, class).await,
            StateEffect::SubmitRegional {
                team_id,
                competition_id,
                captain_id,
            } => {
                self.submit_regional(*team_id, *competition_id, *captain_id)
                    .await
            }
            StateEffect::ApproveRegional {
                team_id,
                competition_id,
            } => {
                self.resolve_regional(
                    *team_id,
                    *competition_id,
                    TeamStatus::ApprovedRegional,
                    LinkStatus::Approved,
                )
                .await
            }
            StateEffect::RejectRegional {
                team_id,
                competition_id,
            } => {
                self.resolve_regional(
                    *team_id,
                    *competition_id,
                    TeamStatus::Rejected,
                    LinkStatus::Rejected,
                )
                .await
            }
            StateEffect::SubmitFederal { team_ids, .. } => self.submit_federal(team_ids).await,
            StateEffect::ApproveFederal {
                competition_id,
                team_ids,
            } => self.approve_federal(*competition_id, team_ids).await,
            StateEffect::GrantRewards { grants, .. } => self.grant_rewards(grants).await,
        }
    }
}
