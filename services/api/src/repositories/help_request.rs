//! Help request repository
//!
//! Deleted requests keep their row with `is_deleted` set and disappear from
//! every read below.

use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use super::{NotificationRepository, Outcome, push_page};
use crate::{
    error::{ApiError, ApiResult},
    lifecycle::{HelpAction, HelpStatus},
    models::{
        Page,
        help_request::{
            CreateHelpRequest, HelpRequest, HelpRequestQuery, UpdateHelpRequest, Urgency,
        },
        notification::{NewNotification, NotificationType},
    },
};

const SELECT_HELP_REQUEST: &str = r#"
    SELECT h.id, h.requester_id, u.name AS requester_name, h.helper_id, h.title,
           h.description, h.category, h.urgency, h.location, h.status,
           h.created_at, h.updated_at
    FROM help_requests h
    JOIN users u ON u.id = h.requester_id
"#;

#[derive(Debug, FromRow)]
struct HelpLock {
    requester_id: Uuid,
    helper_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    status: HelpStatus,
}

impl HelpLock {
    async fn acquire(conn: &mut PgConnection, id: Uuid) -> ApiResult<Self> {
        sqlx::query_as::<_, HelpLock>(
            r#"
            SELECT requester_id, helper_id, status
            FROM help_requests
            WHERE id = $1 AND NOT is_deleted
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Help request"))
    }
}

/// Help request repository
#[derive(Clone)]
pub struct HelpRequestRepository {
    pool: PgPool,
}

impl HelpRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(conn: &mut PgConnection, id: Uuid) -> ApiResult<HelpRequest> {
        sqlx::query_as::<_, HelpRequest>(&format!(
            "{SELECT_HELP_REQUEST} WHERE h.id = $1 AND NOT h.is_deleted"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Help request"))
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<HelpRequest> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    /// Post a new open help request
    pub async fn create(&self, requester_id: Uuid, payload: &CreateHelpRequest) -> ApiResult<HelpRequest> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO help_requests (requester_id, title, description, category, urgency, location)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(requester_id)
        .bind(&payload.title)
        .bind(&payload.description)
        .bind(&payload.category)
        .bind(payload.urgency.unwrap_or(Urgency::Medium).as_str())
        .bind(payload.location.as_deref())
        .fetch_one(&self.pool)
        .await?;

        info!("Help request {} posted by {}", id, requester_id);
        self.get(id).await
    }

    /// Filtered listing, most urgent first then newest
    pub async fn list(&self, query: &HelpRequestQuery) -> ApiResult<(Vec<HelpRequest>, i64)> {
        fn filter(builder: &mut QueryBuilder<'_, Postgres>, query: &HelpRequestQuery) {
            builder.push(" WHERE NOT h.is_deleted");
            if let Some(status) = query.status {
                builder.push(" AND h.status = ").push_bind(status.as_str());
            }
            if let Some(category) = query.category.as_deref().filter(|c| !c.trim().is_empty()) {
                builder.push(" AND h.category = ").push_bind(category.trim().to_string());
            }
            if let Some(urgency) = query.urgency {
                builder.push(" AND h.urgency = ").push_bind(urgency.as_str());
            }
        }

        let mut select = QueryBuilder::new(SELECT_HELP_REQUEST);
        filter(&mut select, query);
        push_page(
            &mut select,
            "CASE h.urgency WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END, h.created_at DESC",
            query.page(),
        );

        let items = select
            .build_query_as::<HelpRequest>()
            .fetch_all(&self.pool)
            .await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM help_requests h");
        filter(&mut count, query);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        Ok((items, total))
    }

    /// Requests posted by one user, newest first
    pub async fn by_requester(&self, requester_id: Uuid, page: Page) -> ApiResult<(Vec<HelpRequest>, i64)> {
        let items = sqlx::query_as::<_, HelpRequest>(&format!(
            r#"{SELECT_HELP_REQUEST}
            WHERE h.requester_id = $1 AND NOT h.is_deleted
            ORDER BY h.created_at DESC
            LIMIT $2 OFFSET $3"#
        ))
        .bind(requester_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM help_requests WHERE requester_id = $1 AND NOT is_deleted",
        )
        .bind(requester_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total))
    }

    /// Requester's edit while nobody has offered help yet
    pub async fn update(&self, id: Uuid, user_id: Uuid, update: &UpdateHelpRequest) -> ApiResult<HelpRequest> {
        let mut tx = self.pool.begin().await?;
        let current = HelpLock::acquire(&mut tx, id).await?;

        if current.requester_id != user_id {
            return Err(ApiError::Forbidden(
                "Only the requester can edit this help request".to_string(),
            ));
        }
        if current.status != HelpStatus::Open {
            return Err(ApiError::BadRequest(
                "Only open help requests can be edited".to_string(),
            ));
        }

        sqlx::query(
            r#"
            UPDATE help_requests SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                urgency = COALESCE($5, urgency),
                location = COALESCE($6, location),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.title.as_deref())
        .bind(update.description.as_deref())
        .bind(update.category.as_deref())
        .bind(update.urgency.map(|u| u.as_str()))
        .bind(update.location.as_deref())
        .execute(&mut *tx)
        .await?;

        let request = Self::fetch(&mut tx, id).await?;
        tx.commit().await?;

        Ok(request)
    }

    /// Hide a request from every listing
    pub async fn soft_delete(&self, id: Uuid, user_id: Uuid) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;
        let current = HelpLock::acquire(&mut tx, id).await?;

        if current.requester_id != user_id {
            return Err(ApiError::Forbidden(
                "Only the requester can delete this help request".to_string(),
            ));
        }

        sqlx::query("UPDATE help_requests SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Help request {} deleted by {}", id, user_id);

        Ok(())
    }

    /// Offer, complete or cancel on behalf of `user_id`
    pub async fn transition(
        &self,
        id: Uuid,
        user_id: Uuid,
        action: HelpAction,
    ) -> ApiResult<Outcome<HelpRequest>> {
        let mut tx = self.pool.begin().await?;
        let current = HelpLock::acquire(&mut tx, id).await?;

        let next = current
            .status
            .apply(action, current.requester_id == user_id)?;
        let helper_id = match action {
            HelpAction::Offer => Some(user_id),
            HelpAction::Complete | HelpAction::Cancel => current.helper_id,
        };

        sqlx::query(
            r#"
            UPDATE help_requests
            SET status = $2, helper_id = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(next.as_str())
        .bind(helper_id)
        .execute(&mut *tx)
        .await?;

        let request = Self::fetch(&mut tx, id).await?;

        let notice = match (action, helper_id) {
            (HelpAction::Offer, _) => {
                let helper_name: String = sqlx::query_scalar("SELECT name FROM users WHERE id = $1")
                    .bind(user_id)
                    .fetch_one(&mut *tx)
                    .await?;

                Some(NewNotification::new(
                    request.requester_id,
                    NotificationType::HelpOffer,
                    format!("{} offered to help with {}", helper_name, request.title),
                    request.id,
                ))
            }
            (HelpAction::Complete, Some(helper)) => Some(NewNotification::new(
                helper,
                NotificationType::HelpCompleted,
                format!(
                    "{} marked {} as completed. Thank you for helping",
                    request.requester_name, request.title
                ),
                request.id,
            )),
            _ => None,
        };

        let mut notifications = Vec::new();
        if let Some(notice) = notice {
            notifications.push(NotificationRepository::insert(&mut tx, &notice).await?);
        }

        tx.commit().await?;
        info!("Help request {} moved from {} to {}", id, current.status, next);

        Ok(Outcome::new(request, notifications))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{insert_user, migrated_pool};

    #[tokio::test]
    #[ignore = "requires running PostgreSQL"]
    async fn test_deleted_requests_are_hidden() -> Result<(), Box<dyn std::error::Error>> {
        let pool = migrated_pool().await;
        let help = HelpRequestRepository::new(pool.clone());
        let requester = insert_user(&pool, "Requester").await;
        let neighbour = insert_user(&pool, "Neighbour").await;

        let request = help
            .create(
                requester,
                &CreateHelpRequest {
                    title: "Move a sofa".to_string(),
                    description: "Second floor, no lift".to_string(),
                    category: "moving".to_string(),
                    urgency: Some(Urgency::High),
                    location: None,
                },
            )
            .await?;
        assert_eq!(help.by_requester(requester, Page::new(None, None)).await?.1, 1);

        let foreign = help.soft_delete(request.id, neighbour).await;
        assert!(matches!(foreign, Err(ApiError::Forbidden(_))));

        help.soft_delete(request.id, requester).await?;

        assert!(matches!(help.get(request.id).await, Err(ApiError::NotFound(_))));
        let (mine, total) = help.by_requester(requester, Page::new(None, None)).await?;
        assert!(mine.is_empty());
        assert_eq!(total, 0);

        let (listed, _) = help
            .list(&HelpRequestQuery {
                category: Some("moving".to_string()),
                ..Default::default()
            })
            .await?;
        assert!(listed.iter().all(|r| r.id != request.id));

        let offer = help.transition(request.id, neighbour, HelpAction::Offer).await;
        assert!(matches!(offer, Err(ApiError::NotFound(_))));

        Ok(())
    }
}
