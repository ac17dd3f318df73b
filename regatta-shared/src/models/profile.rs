//! Profile model and database operations
//!
//! Profiles are never deleted: deactivation is a role change to `banned`
//! or `on_moderation`, which keeps authored content and references intact.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE user_role AS ENUM (
//!     'user', 'regional_admin', 'federation_admin', 'banned', 'on_moderation'
//! );
//!
//! CREATE TABLE profiles (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     name TEXT NOT NULL,
//!     role user_role NOT NULL DEFAULT 'user',
//!     class TEXT,
//!     region INTEGER,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular participant
    User,

    /// Moderates regional competition submissions
    RegionalAdmin,

    /// Moderates federal submissions
    FederationAdmin,

    /// Deactivated account
    Banned,

    /// Account frozen pending review
    OnModeration,
}

impl UserRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::RegionalAdmin => "regional_admin",
            UserRole::FederationAdmin => "federation_admin",
            UserRole::Banned => "banned",
            UserRole::OnModeration => "on_moderation",
        }
    }

    /// Checks if the account may initiate or resolve workflow actions
    pub fn is_active(&self) -> bool {
        !matches!(self, UserRole::Banned | UserRole::OnModeration)
    }

    /// Checks if the role carries moderation privileges
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::RegionalAdmin | UserRole::FederationAdmin)
    }
}

/// Profile model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    /// Unique profile ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Current role
    pub role: UserRole,

    /// Eligibility class tag (e.g. "striker"), if any
    pub class: Option<String>,

    /// Home region number, if assigned
    pub region: Option<i32>,

    /// When the profile was created
    pub created_at: DateTime<Utc>,

    /// When the profile was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProfile {
    /// Display name
    pub name: String,

    /// Initial role (defaults to `user`)
    #[serde(default = "default_role")]
    pub role: UserRole,

    /// Eligibility class tag
    pub class: Option<String>,

    /// Home region number
    pub region: Option<i32>,
}

fn default_role() -> UserRole {
    UserRole::User
}

impl Profile {
    /// Creates a new profile
    pub async fn create(pool: &PgPool, data: CreateProfile) -> Result<Self, sqlx::Error> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (name, role, class, region)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, role, class, region, created_at, updated_at
            "#,
        )
        .bind(data.name)
        .bind(data.role)
        .bind(data.class)
        .bind(data.region)
        .fetch_one(pool)
        .await?;

        Ok(profile)
    }

    /// Finds a profile by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, name, role, class, region, created_at, updated_at
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(profile)
    }

    /// Lists all profiles with the given role
    ///
    /// Used to fan moderation requests out to every federation admin.
    pub async fn list_by_role(pool: &PgPool, role: UserRole) -> Result<Vec<Self>, sqlx::Error> {
        let profiles = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, name, role, class, region, created_at, updated_at
            FROM profiles
            WHERE role = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(role)
        .fetch_all(pool)
        .await?;

        Ok(profiles)
    }

    /// Changes a profile's role
    ///
    /// Federation admins are assigned out of band; this operation refuses
    /// to promote to or demote from `federation_admin`.
    pub async fn update_role(
        pool: &PgPool,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        if role == UserRole::FederationAdmin {
            return Ok(None);
        }

        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET role = $2, updated_at = NOW()
            WHERE id = $1 AND role <> 'federation_admin'
            RETURNING id, name, role, class, region, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(role)
        .fetch_optional(pool)
        .await?;

        Ok(profile)
    }
}
