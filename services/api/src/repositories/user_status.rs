//! Presence repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::user_status::UserStatus,
};

/// Presence rows, one per user
#[derive(Clone)]
pub struct UserStatusRepository {
    pool: PgPool,
}

impl UserStatusRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Status of a user; users without a row are reported offline
    pub async fn find(&self, user_id: Uuid) -> ApiResult<UserStatus> {
        sqlx::query_as::<_, UserStatus>(
            r#"
            SELECT u.id AS user_id,
                   COALESCE(s.is_online, FALSE) AS is_online,
                   COALESCE(s.last_seen, u.created_at) AS last_seen
            FROM users u
            LEFT JOIN user_status s ON s.user_id = u.id
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
    }

    /// Upsert the online flag and touch `last_seen`
    pub async fn set_online(&self, user_id: Uuid, is_online: bool) -> ApiResult<UserStatus> {
        let status = sqlx::query_as::<_, UserStatus>(
            r#"
            INSERT INTO user_status (user_id, is_online, last_seen)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET is_online = EXCLUDED.is_online, last_seen = NOW()
            RETURNING user_id, is_online, last_seen
            "#,
        )
        .bind(user_id)
        .bind(is_online)
        .fetch_one(&self.pool)
        .await?;

        Ok(status)
    }

    /// Everyone currently flagged online
    pub async fn online(&self) -> ApiResult<Vec<UserStatus>> {
        let statuses = sqlx::query_as::<_, UserStatus>(
            r#"
            SELECT user_id, is_online, last_seen
            FROM user_status
            WHERE is_online
            ORDER BY last_seen DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(statuses)
    }

    /// Flag everyone offline; no sockets survive a restart
    pub async fn reset_all(&self) -> ApiResult<u64> {
        let result = sqlx::query(
            "UPDATE user_status SET is_online = FALSE, last_seen = NOW() WHERE is_online",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
