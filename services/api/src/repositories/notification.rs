//! Notification repository for database operations

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::push_page;
use crate::{
    error::{ApiError, ApiResult},
    models::{
        Page,
        notification::{NewNotification, Notification},
    },
};

const COLUMNS: &str = "id, user_id, type, message, related_id, is_read, created_at";

/// Notification repository for database operations
#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Create a new notification repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a notification on an open connection or transaction
    pub async fn insert(
        conn: &mut PgConnection,
        notification: &NewNotification,
    ) -> Result<Notification, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (user_id, type, message, related_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(notification.related_id)
        .fetch_one(conn)
        .await
    }

    /// Page through a user's notifications, newest first
    pub async fn list(
        &self,
        user_id: Uuid,
        unread_only: bool,
        page: Page,
    ) -> ApiResult<(Vec<Notification>, i64)> {
        fn filter<'a>(builder: &mut QueryBuilder<'a, Postgres>, user_id: Uuid, unread_only: bool) {
            builder.push(" WHERE user_id = ").push_bind(user_id);
            if unread_only {
                builder.push(" AND NOT is_read");
            }
        }

        let mut query = QueryBuilder::new(format!("SELECT {COLUMNS} FROM notifications"));
        filter(&mut query, user_id, unread_only);
        push_page(&mut query, "created_at DESC", page);

        let items = query
            .build_query_as::<Notification>()
            .fetch_all(&self.pool)
            .await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM notifications");
        filter(&mut count, user_id, unread_only);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        Ok((items, total))
    }

    pub async fn unread_count(&self, user_id: Uuid) -> ApiResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Mark one of the user's notifications read
    pub async fn mark_read(&self, id: Uuid, user_id: Uuid) -> ApiResult<Notification> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications SET is_read = TRUE
            WHERE id = $1 AND user_id = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification"))
    }

    /// Mark everything read; returns how many rows changed
    pub async fn mark_all_read(&self, user_id: Uuid) -> ApiResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("Notification"));
        }

        Ok(())
    }
}
