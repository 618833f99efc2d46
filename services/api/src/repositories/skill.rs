//! Skill repository for database operations

use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use super::{like_pattern, push_page};
use crate::{
    error::{ApiError, ApiResult},
    models::skill::{
        CreateSkillRequest, Skill, SkillAvailability, SkillLevel, SkillQuery, UpdateSkillRequest,
    },
};

const SELECT_SKILL: &str = r#"
    SELECT s.id, s.user_id, u.name AS user_name, s.title, s.description, s.category,
           s.level, s.availability, s.booked_by, s.created_at, s.updated_at
    FROM skills s
    JOIN users u ON u.id = s.user_id
"#;

/// Columns a write needs to decide whether it is allowed
#[derive(Debug, FromRow)]
pub(crate) struct SkillLock {
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub availability: SkillAvailability,
}

impl SkillLock {
    /// Lock the skill row for the rest of the transaction
    pub(crate) async fn acquire(conn: &mut PgConnection, id: Uuid) -> ApiResult<Self> {
        sqlx::query_as::<_, SkillLock>(
            "SELECT user_id, availability FROM skills WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Skill"))
    }
}

/// Skill repository for database operations
#[derive(Clone)]
pub struct SkillRepository {
    pool: PgPool,
}

impl SkillRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<Skill> {
        sqlx::query_as::<_, Skill>(&format!("{SELECT_SKILL} WHERE s.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Skill"))
    }

    /// Offer a new skill, available straight away
    pub async fn create(&self, user_id: Uuid, payload: &CreateSkillRequest) -> ApiResult<Skill> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO skills (user_id, title, description, category, level)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(&payload.title)
        .bind(&payload.description)
        .bind(&payload.category)
        .bind(payload.level.unwrap_or(SkillLevel::Intermediate).as_str())
        .fetch_one(&self.pool)
        .await?;

        info!("Skill {} offered by {}", id, user_id);
        self.get(id).await
    }

    pub async fn list(&self, query: &SkillQuery) -> ApiResult<(Vec<Skill>, i64)> {
        fn filter(builder: &mut QueryBuilder<'_, Postgres>, query: &SkillQuery) {
            builder.push(" WHERE TRUE");
            if let Some(category) = query.category.as_deref().filter(|c| !c.trim().is_empty()) {
                builder.push(" AND s.category = ").push_bind(category.trim().to_string());
            }
            if let Some(availability) = query.availability {
                builder
                    .push(" AND s.availability = ")
                    .push_bind(availability.as_str());
            }
            if let Some(user_id) = query.user_id {
                builder.push(" AND s.user_id = ").push_bind(user_id);
            }
            if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
                let pattern = like_pattern(search);
                builder
                    .push(" AND (s.title ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR s.description ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
        }

        let mut select = QueryBuilder::new(SELECT_SKILL);
        filter(&mut select, query);
        push_page(&mut select, "s.created_at DESC", query.page());

        let items = select
            .build_query_as::<Skill>()
            .fetch_all(&self.pool)
            .await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM skills s");
        filter(&mut count, query);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        Ok((items, total))
    }

    /// Provider's edit; availability may not be moved while booked
    pub async fn update(&self, id: Uuid, user_id: Uuid, update: &UpdateSkillRequest) -> ApiResult<Skill> {
        let mut tx = self.pool.begin().await?;
        let current = SkillLock::acquire(&mut tx, id).await?;

        if current.user_id != user_id {
            return Err(ApiError::Forbidden(
                "Only the provider can edit this skill".to_string(),
            ));
        }

        match update.availability {
            Some(SkillAvailability::Booked) => {
                return Err(ApiError::BadRequest(
                    "Availability can only be set to available or unavailable".to_string(),
                ));
            }
            Some(_) if current.availability == SkillAvailability::Booked => {
                return Err(ApiError::BadRequest("Skill is currently booked".to_string()));
            }
            _ => {}
        }

        sqlx::query(
            r#"
            UPDATE skills SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                level = COALESCE($5, level),
                availability = COALESCE($6, availability),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.title.as_deref())
        .bind(update.description.as_deref())
        .bind(update.category.as_deref())
        .bind(update.level.map(|l| l.as_str()))
        .bind(update.availability.map(|a| a.as_str()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get(id).await
    }

    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;
        let current = SkillLock::acquire(&mut tx, id).await?;

        if current.user_id != user_id {
            return Err(ApiError::Forbidden(
                "Only the provider can delete this skill".to_string(),
            ));
        }
        if current.availability == SkillAvailability::Booked {
            return Err(ApiError::BadRequest(
                "Cannot delete a skill while it is booked".to_string(),
            ));
        }

        sqlx::query("DELETE FROM skills WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Skill {} deleted by {}", id, user_id);

        Ok(())
    }
}
