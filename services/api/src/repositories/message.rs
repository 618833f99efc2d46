//! Message repository for database operations

use sqlx::{FromRow, PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use super::{NotificationRepository, Outcome};
use crate::{
    error::{ApiError, ApiResult},
    models::{
        Page,
        message::{ConversationSummary, Message},
        notification::{NewNotification, NotificationType},
    },
};

const SELECT_MESSAGE: &str = r#"
    SELECT m.id, m.sender_id, u.name AS sender_name, m.recipient_id, m.content,
           m.is_read, m.created_at
    FROM messages m
    JOIN users u ON u.id = m.sender_id
"#;

#[derive(Debug, FromRow)]
struct MessageOwners {
    sender_id: Uuid,
    recipient_id: Uuid,
}

/// Message repository for database operations
#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(conn: &mut PgConnection, id: Uuid) -> ApiResult<Message> {
        sqlx::query_as::<_, Message>(&format!(
            "{SELECT_MESSAGE} WHERE m.id = $1 AND NOT m.is_deleted"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Message"))
    }

    async fn owners(conn: &mut PgConnection, id: Uuid) -> ApiResult<MessageOwners> {
        sqlx::query_as::<_, MessageOwners>(
            "SELECT sender_id, recipient_id FROM messages WHERE id = $1 AND NOT is_deleted FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Message"))
    }

    /// Store a message and the recipient's notification together
    pub async fn send(&self, sender_id: Uuid, recipient_id: Uuid, content: &str) -> ApiResult<Outcome<Message>> {
        let mut tx = self.pool.begin().await?;

        let recipient: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(recipient_id)
            .fetch_one(&mut *tx)
            .await?;

        if !recipient {
            return Err(ApiError::not_found("Recipient"));
        }

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO messages (sender_id, recipient_id, content) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(sender_id)
        .bind(recipient_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        let message = Self::fetch(&mut tx, id).await?;
        let notification = NotificationRepository::insert(
            &mut tx,
            &NewNotification::new(
                recipient_id,
                NotificationType::Message,
                format!("New message from {}", message.sender_name),
                message.id,
            ),
        )
        .await?;

        tx.commit().await?;
        debug!("Message {} sent from {} to {}", id, sender_id, recipient_id);

        Ok(Outcome::new(message, vec![notification]))
    }

    /// Latest message with each partner, most recent conversation first
    pub async fn conversations(&self, user_id: Uuid) -> ApiResult<Vec<ConversationSummary>> {
        let conversations = sqlx::query_as::<_, ConversationSummary>(
            r#"
            WITH visible AS (
                SELECT m.id, m.sender_id, m.recipient_id, m.content, m.is_read, m.created_at,
                       CASE WHEN m.sender_id = $1 THEN m.recipient_id ELSE m.sender_id END AS partner_id
                FROM messages m
                WHERE (m.sender_id = $1 OR m.recipient_id = $1) AND NOT m.is_deleted
            ),
            latest AS (
                SELECT DISTINCT ON (partner_id) partner_id, id, content, sender_id, created_at
                FROM visible
                ORDER BY partner_id, created_at DESC
            )
            SELECT l.partner_id, u.name AS partner_name, u.avatar_url AS partner_avatar_url,
                   l.id AS last_message_id, l.content AS last_message,
                   l.sender_id AS last_sender_id, l.created_at AS last_message_at,
                   (SELECT COUNT(*) FROM visible v
                    WHERE v.partner_id = l.partner_id AND v.recipient_id = $1 AND NOT v.is_read
                   ) AS unread_count
            FROM latest l
            JOIN users u ON u.id = l.partner_id
            ORDER BY l.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(conversations)
    }

    /// One page of a thread in chronological order; page 1 holds the newest messages
    pub async fn thread(&self, user_id: Uuid, partner_id: Uuid, page: Page) -> ApiResult<(Vec<Message>, i64)> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            r#"
            SELECT * FROM (
                {SELECT_MESSAGE}
                WHERE NOT m.is_deleted
                  AND ((m.sender_id = $1 AND m.recipient_id = $2)
                    OR (m.sender_id = $2 AND m.recipient_id = $1))
                ORDER BY m.created_at DESC
                LIMIT $3 OFFSET $4
            ) recent
            ORDER BY created_at ASC
            "#
        ))
        .bind(user_id)
        .bind(partner_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE NOT is_deleted
              AND ((sender_id = $1 AND recipient_id = $2)
                OR (sender_id = $2 AND recipient_id = $1))
            "#,
        )
        .bind(user_id)
        .bind(partner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((messages, total))
    }

    /// Mark everything `partner_id` sent to the user as read
    pub async fn mark_thread_read(&self, user_id: Uuid, partner_id: Uuid) -> ApiResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET is_read = TRUE
            WHERE recipient_id = $1 AND sender_id = $2 AND NOT is_read AND NOT is_deleted
            "#,
        )
        .bind(user_id)
        .bind(partner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Only the recipient can mark a message read
    pub async fn mark_read(&self, id: Uuid, user_id: Uuid) -> ApiResult<Message> {
        let mut tx = self.pool.begin().await?;
        let owners = Self::owners(&mut tx, id).await?;

        if owners.recipient_id != user_id {
            return Err(ApiError::Forbidden(
                "Only the recipient can mark a message as read".to_string(),
            ));
        }

        sqlx::query("UPDATE messages SET is_read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let message = Self::fetch(&mut tx, id).await?;
        tx.commit().await?;

        Ok(message)
    }

    /// Only the sender can delete; the row is kept with `is_deleted` set
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;
        let owners = Self::owners(&mut tx, id).await?;

        if owners.sender_id != user_id {
            return Err(ApiError::Forbidden(
                "Only the sender can delete a message".to_string(),
            ));
        }

        sqlx::query("UPDATE messages SET is_deleted = TRUE WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn unread_count(&self, user_id: Uuid) -> ApiResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE recipient_id = $1 AND NOT is_read AND NOT is_deleted",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
