//! User profile repository

use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{like_pattern, push_page};
use crate::{
    error::{ApiError, ApiResult},
    models::{
        Page,
        user::{Profile, PublicProfile, UpdateProfileRequest},
    },
};

const PROFILE_COLUMNS: &str = "id, name, email, bio, location, skills, avatar_url, \
                               trust_score, total_reviews, created_at, updated_at";
const PUBLIC_COLUMNS: &str =
    "id, name, bio, location, skills, avatar_url, trust_score, total_reviews, created_at";

/// User repository for profile reads and updates
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Full profile of the caller
    pub async fn profile(&self, id: Uuid) -> ApiResult<Profile> {
        sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
    }

    /// Profile as shown to other members
    pub async fn public_profile(&self, id: Uuid) -> ApiResult<PublicProfile> {
        sqlx::query_as::<_, PublicProfile>(&format!(
            "SELECT {PUBLIC_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
    }

    pub async fn exists(&self, id: Uuid) -> ApiResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    /// Apply the fields present in `update`; values are already validated
    pub async fn update_profile(&self, id: Uuid, update: &UpdateProfileRequest) -> ApiResult<Profile> {
        sqlx::query_as::<_, Profile>(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                bio = COALESCE($3, bio),
                location = COALESCE($4, location),
                skills = COALESCE($5, skills),
                avatar_url = COALESCE($6, avatar_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.bio.as_deref())
        .bind(update.location.as_deref())
        .bind(update.skills.as_deref())
        .bind(update.avatar_url.as_deref())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
    }

    /// Search members by name or listed skill, best rated first
    pub async fn search(&self, term: Option<&str>, page: Page) -> ApiResult<(Vec<PublicProfile>, i64)> {
        fn filter(builder: &mut QueryBuilder<'_, Postgres>, term: Option<&str>) {
            if let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) {
                let pattern = like_pattern(term);
                builder
                    .push(" WHERE name ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR EXISTS (SELECT 1 FROM unnest(skills) AS skill WHERE skill ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
        }

        let mut query = QueryBuilder::new(format!("SELECT {PUBLIC_COLUMNS} FROM users"));
        filter(&mut query, term);
        push_page(&mut query, "trust_score DESC, name ASC", page);

        let items = query
            .build_query_as::<PublicProfile>()
            .fetch_all(&self.pool)
            .await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users");
        filter(&mut count, term);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        Ok((items, total))
    }
}
