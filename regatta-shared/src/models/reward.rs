//! Reward model
//!
//! Rewards are append-only; distribution mistakes are corrected by issuing
//! follow-up rewards, not by editing rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Reward kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reward_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    Certificate,
    Medal,
    Prize,
    Other,
}

impl RewardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardKind::Certificate => "certificate",
            RewardKind::Medal => "medal",
            RewardKind::Prize => "prize",
            RewardKind::Other => "other",
        }
    }
}

/// Reward row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reward {
    /// Unique reward ID
    pub id: Uuid,

    /// Recipient's profile ID
    pub user_id: Uuid,

    /// Reward kind
    pub kind: RewardKind,

    /// Free-form value, e.g. "Gold medal, regional finals"
    pub value: String,

    /// Competition the reward was earned in, if any
    pub competition_id: Option<Uuid>,

    /// When the reward was granted
    pub created_at: DateTime<Utc>,
}

/// Input for granting a reward
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReward {
    pub user_id: Uuid,
    pub kind: RewardKind,
    pub value: String,
    pub competition_id: Option<Uuid>,
}

impl Reward {
    /// Grants a reward
    pub async fn create(pool: &PgPool, data: CreateReward) -> Result<Self, sqlx::Error> {
        let reward = sqlx::query_as::<_, Reward>(
            r#"
            INSERT INTO rewards (user_id, kind, value, competition_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, kind, value, competition_id, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.kind)
        .bind(data.value)
        .bind(data.competition_id)
        .fetch_one(pool)
        .await?;

        Ok(reward)
    }

    /// Lists a user's rewards, newest first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let rewards = sqlx::query_as::<_, Reward>(
            r#"
            SELECT id, user_id, kind, value, competition_id, created_at
            FROM rewards
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(rewards)
    }
}
