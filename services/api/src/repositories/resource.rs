//! Resource repository for database operations

use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use super::{like_pattern, push_page};
use crate::{
    error::{ApiError, ApiResult},
    models::resource::{
        CreateResourceRequest, Resource, ResourceAvailability, ResourceQuery,
        UpdateResourceRequest,
    },
};

pub(crate) const SELECT_RESOURCE: &str = r#"
    SELECT r.id, r.owner_id, u.name AS owner_name, r.title, r.description, r.category,
           r.condition, r.location, r.image_url, r.availability, r.borrowed_by,
           r.created_at, r.updated_at
    FROM resources r
    JOIN users u ON u.id = r.owner_id
"#;

/// Columns a write needs to decide whether it is allowed
#[derive(Debug, FromRow)]
pub(crate) struct ResourceLock {
    pub owner_id: Uuid,
    #[sqlx(try_from = "String")]
    pub availability: ResourceAvailability,
}

impl ResourceLock {
    /// Lock the resource row for the rest of the transaction
    pub(crate) async fn acquire(conn: &mut PgConnection, id: Uuid) -> ApiResult<Self> {
        sqlx::query_as::<_, ResourceLock>(
            "SELECT owner_id, availability FROM resources WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Resource"))
    }
}

/// Resource repository for database operations
#[derive(Clone)]
pub struct ResourceRepository {
    pool: PgPool,
}

impl ResourceRepository {
    /// Create a new resource repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> ApiResult<Option<Resource>> {
        let resource = sqlx::query_as::<_, Resource>(&format!("{SELECT_RESOURCE} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(resource)
    }

    /// Fetch a resource or fail with 404
    pub async fn get(&self, id: Uuid) -> ApiResult<Resource> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Resource"))
    }

    /// List a new resource as available
    pub async fn create(&self, owner_id: Uuid, payload: &CreateResourceRequest) -> ApiResult<Resource> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO resources (owner_id, title, description, category, condition, location, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(owner_id)
        .bind(&payload.title)
        .bind(&payload.description)
        .bind(&payload.category)
        .bind(payload.condition.as_deref())
        .bind(payload.location.as_deref())
        .bind(payload.image_url.as_deref())
        .fetch_one(&self.pool)
        .await?;

        info!("Resource {} listed by {}", id, owner_id);
        self.get(id).await
    }

    /// Filtered listing, newest first
    pub async fn list(&self, query: &ResourceQuery) -> ApiResult<(Vec<Resource>, i64)> {
        fn filter(builder: &mut QueryBuilder<'_, Postgres>, query: &ResourceQuery) {
            builder.push(" WHERE TRUE");
            if let Some(category) = query.category.as_deref().filter(|c| !c.trim().is_empty()) {
                builder.push(" AND r.category = ").push_bind(category.trim().to_string());
            }
            if let Some(availability) = query.availability {
                builder
                    .push(" AND r.availability = ")
                    .push_bind(availability.as_str());
            }
            if let Some(owner_id) = query.owner_id {
                builder.push(" AND r.owner_id = ").push_bind(owner_id);
            }
            if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
                let pattern = like_pattern(search);
                builder
                    .push(" AND (r.title ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR r.description ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
        }

        let page = query.page();

        let mut select = QueryBuilder::new(SELECT_RESOURCE);
        filter(&mut select, query);
        push_page(&mut select, "r.created_at DESC", page);

        let items = select
            .build_query_as::<Resource>()
            .fetch_all(&self.pool)
            .await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM resources r");
        filter(&mut count, query);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        Ok((items, total))
    }

    /// Owner's edit; returns the row and whether availability moved
    pub async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        update: &UpdateResourceRequest,
    ) -> ApiResult<(Resource, bool)> {
        let mut tx = self.pool.begin().await?;
        let current = ResourceLock::acquire(&mut tx, id).await?;

        if current.owner_id != owner_id {
            return Err(ApiError::Forbidden(
                "Only the owner can edit this resource".to_string(),
            ));
        }

        let availability = match update.availability {
            Some(ResourceAvailability::Borrowed) => {
                return Err(ApiError::BadRequest(
                    "Availability can only be set to available or unavailable".to_string(),
                ));
            }
            Some(_) if current.availability == ResourceAvailability::Borrowed => {
                return Err(ApiError::BadRequest(
                    "Resource is currently borrowed".to_string(),
                ));
            }
            other => other,
        };

        sqlx::query(
            r#"
            UPDATE resources SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                condition = COALESCE($5, condition),
                location = COALESCE($6, location),
                image_url = COALESCE($7, image_url),
                availability = COALESCE($8, availability),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.title.as_deref())
        .bind(update.description.as_deref())
        .bind(update.category.as_deref())
        .bind(update.condition.as_deref())
        .bind(update.location.as_deref())
        .bind(update.image_url.as_deref())
        .bind(availability.map(|a| a.as_str()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let changed = availability.is_some_and(|a| a != current.availability);
        Ok((self.get(id).await?, changed))
    }

    /// Remove a resource that is not on loan
    pub async fn delete(&self, id: Uuid, owner_id: Uuid) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;
        let current = ResourceLock::acquire(&mut tx, id).await?;

        if current.owner_id != owner_id {
            return Err(ApiError::Forbidden(
                "Only the owner can delete this resource".to_string(),
            ));
        }
        if current.availability == ResourceAvailability::Borrowed {
            return Err(ApiError::BadRequest(
                "Cannot delete a resource while it is borrowed".to_string(),
            ));
        }

        sqlx::query("DELETE FROM resources WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Resource {} deleted by {}", id, owner_id);

        Ok(())
    }
}
