//! Event repository for database operations

use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use super::{NotificationRepository, Outcome, push_page};
use crate::{
    error::{ApiError, ApiResult},
    models::{
        event::{Attendee, CreateEventRequest, Event, EventQuery, UpdateEventRequest},
        notification::{NewNotification, NotificationType},
    },
};

const SELECT_EVENT: &str = r#"
    SELECT e.id, e.organizer_id, u.name AS organizer_name, e.title, e.description,
           e.location, e.category, e.starts_at, e.ends_at, e.capacity,
           (SELECT COUNT(*) FROM event_attendees a WHERE a.event_id = e.id) AS attendee_count,
           e.created_at, e.updated_at
    FROM events e
    JOIN users u ON u.id = e.organizer_id
"#;

#[derive(Debug, FromRow)]
struct EventLock {
    organizer_id: Uuid,
    title: String,
    capacity: Option<i32>,
    started: bool,
}

impl EventLock {
    async fn acquire(conn: &mut PgConnection, id: Uuid) -> ApiResult<Self> {
        sqlx::query_as::<_, EventLock>(
            r#"
            SELECT organizer_id, title, capacity, starts_at <= NOW() AS started
            FROM events
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Event"))
    }
}

async fn attendee_count(conn: &mut PgConnection, id: Uuid) -> ApiResult<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM event_attendees WHERE event_id = $1")
        .bind(id)
        .fetch_one(conn)
        .await?;

    Ok(count)
}

/// Event repository for database operations
#[derive(Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(conn: &mut PgConnection, id: Uuid) -> ApiResult<Event> {
        sqlx::query_as::<_, Event>(&format!("{SELECT_EVENT} WHERE e.id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| ApiError::not_found("Event"))
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<Event> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    pub async fn create(&self, organizer_id: Uuid, payload: &CreateEventRequest) -> ApiResult<Event> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO events (organizer_id, title, description, location, category, starts_at, ends_at, capacity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(organizer_id)
        .bind(&payload.title)
        .bind(&payload.description)
        .bind(&payload.location)
        .bind(payload.category.as_deref())
        .bind(payload.starts_at)
        .bind(payload.ends_at)
        .bind(payload.capacity)
        .fetch_one(&self.pool)
        .await?;

        info!("Event {} created by {}", id, organizer_id);
        self.get(id).await
    }

    /// Listing in start order; `upcoming` defaults to true
    pub async fn list(&self, query: &EventQuery) -> ApiResult<(Vec<Event>, i64)> {
        fn filter(builder: &mut QueryBuilder<'_, Postgres>, query: &EventQuery) {
            builder.push(" WHERE TRUE");
            if query.upcoming.unwrap_or(true) {
                builder.push(" AND e.starts_at >= NOW()");
            }
            if let Some(category) = query.category.as_deref().filter(|c| !c.trim().is_empty()) {
                builder.push(" AND e.category = ").push_bind(category.trim().to_string());
            }
        }

        let mut select = QueryBuilder::new(SELECT_EVENT);
        filter(&mut select, query);
        push_page(&mut select, "e.starts_at ASC", query.page());

        let items = select.build_query_as::<Event>().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM events e");
        filter(&mut count, query);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        Ok((items, total))
    }

    /// Organizer's edit; capacity may not drop below the current attendance
    pub async fn update(&self, id: Uuid, organizer_id: Uuid, update: &UpdateEventRequest) -> ApiResult<Event> {
        let mut tx = self.pool.begin().await?;
        let current = EventLock::acquire(&mut tx, id).await?;

        if current.organizer_id != organizer_id {
            return Err(ApiError::Forbidden(
                "Only the organizer can edit this event".to_string(),
            ));
        }

        if let Some(capacity) = update.capacity {
            let attending = attendee_count(&mut tx, id).await?;
            if i64::from(capacity) < attending {
                return Err(ApiError::BadRequest(format!(
                    "Capacity cannot be lower than the {} people already attending",
                    attending
                )));
            }
        }

        sqlx::query(
            r#"
            UPDATE events SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                location = COALESCE($4, location),
                category = COALESCE($5, category),
                starts_at = COALESCE($6, starts_at),
                ends_at = COALESCE($7, ends_at),
                capacity = COALESCE($8, capacity),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.title.as_deref())
        .bind(update.description.as_deref())
        .bind(update.location.as_deref())
        .bind(update.category.as_deref())
        .bind(update.starts_at)
        .bind(update.ends_at)
        .bind(update.capacity)
        .execute(&mut *tx)
        .await?;

        let event = Self::fetch(&mut tx, id).await?;
        if let Some(ends_at) = event.ends_at {
            if ends_at < event.starts_at {
                return Err(ApiError::BadRequest(
                    "Event cannot end before it starts".to_string(),
                ));
            }
        }

        tx.commit().await?;
        Ok(event)
    }

    pub async fn delete(&self, id: Uuid, organizer_id: Uuid) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;
        let current = EventLock::acquire(&mut tx, id).await?;

        if current.organizer_id != organizer_id {
            return Err(ApiError::Forbidden(
                "Only the organizer can delete this event".to_string(),
            ));
        }

        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Event {} deleted by {}", id, organizer_id);

        Ok(())
    }

    /// Sign up for an event that has not started and still has room
    pub async fn join(&self, id: Uuid, user_id: Uuid) -> ApiResult<Outcome<Event>> {
        let mut tx = self.pool.begin().await?;
        let current = EventLock::acquire(&mut tx, id).await?;

        if current.started {
            return Err(ApiError::BadRequest(
                "Event has already started".to_string(),
            ));
        }

        let joined: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM event_attendees WHERE event_id = $1 AND user_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if joined {
            return Err(ApiError::Conflict(
                "You have already joined this event".to_string(),
            ));
        }

        if let Some(capacity) = current.capacity {
            if attendee_count(&mut tx, id).await? >= i64::from(capacity) {
                return Err(ApiError::BadRequest("Event is full".to_string()));
            }
        }

        sqlx::query("INSERT INTO event_attendees (event_id, user_id) VALUES ($1, $2)")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let mut notifications = Vec::new();
        if current.organizer_id != user_id {
            let name: String = sqlx::query_scalar("SELECT name FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;

            let notification = NotificationRepository::insert(
                &mut tx,
                &NewNotification::new(
                    current.organizer_id,
                    NotificationType::EventJoin,
                    format!("{} is attending {}", name, current.title),
                    id,
                ),
            )
            .await?;
            notifications.push(notification);
        }

        let event = Self::fetch(&mut tx, id).await?;
        tx.commit().await?;
        info!("User {} joined event {}", user_id, id);

        Ok(Outcome::new(event, notifications))
    }

    pub async fn leave(&self, id: Uuid, user_id: Uuid) -> ApiResult<Event> {
        let mut tx = self.pool.begin().await?;
        EventLock::acquire(&mut tx, id).await?;

        let result = sqlx::query("DELETE FROM event_attendees WHERE event_id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(
                "You have not joined this event".to_string(),
            ));
        }

        let event = Self::fetch(&mut tx, id).await?;
        tx.commit().await?;

        Ok(event)
    }

    /// Attendees in sign-up order
    pub async fn attendees(&self, id: Uuid) -> ApiResult<Vec<Attendee>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM events WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        if !exists {
            return Err(ApiError::not_found("Event"));
        }

        let attendees = sqlx::query_as::<_, Attendee>(
            r#"
            SELECT a.user_id, u.name, u.avatar_url, a.joined_at
            FROM event_attendees a
            JOIN users u ON u.id = a.user_id
            WHERE a.event_id = $1
            ORDER BY a.joined_at ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attendees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{insert_user, migrated_pool};
    use chrono::{Duration, Utc};

    fn meetup(capacity: Option<i32>) -> CreateEventRequest {
        CreateEventRequest {
            title: "Repair cafe".to_string(),
            description: "Bring something broken".to_string(),
            location: "Library hall".to_string(),
            category: None,
            starts_at: Utc::now() + Duration::days(7),
            ends_at: None,
            capacity,
        }
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL"]
    async fn test_join_respects_capacity() -> Result<(), Box<dyn std::error::Error>> {
        let pool = migrated_pool().await;
        let events = EventRepository::new(pool.clone());

        let organizer = insert_user(&pool, "Organizer").await;
        let guest = insert_user(&pool, "Guest").await;
        let late = insert_user(&pool, "Late").await;

        let event = events.create(organizer, &meetup(Some(1))).await?;

        let joined = events.join(event.id, guest).await?;
        assert_eq!(joined.value.attendee_count, 1);
        assert_eq!(joined.notifications.len(), 1);
        assert_eq!(joined.notifications[0].user_id, organizer);

        let twice = events.join(event.id, guest).await;
        assert!(matches!(twice, Err(ApiError::Conflict(_))));

        let full = events.join(event.id, late).await;
        assert!(matches!(full, Err(ApiError::BadRequest(msg)) if msg == "Event is full"));

        events.leave(event.id, guest).await?;
        events.join(event.id, late).await?;
        let attendees = events.attendees(event.id).await?;
        assert_eq!(attendees.len(), 1);
        assert_eq!(attendees[0].user_id, late);

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL"]
    async fn test_organizer_joining_is_not_notified() -> Result<(), Box<dyn std::error::Error>> {
        let pool = migrated_pool().await;
        let events = EventRepository::new(pool.clone());
        let organizer = insert_user(&pool, "Organizer").await;

        let event = events.create(organizer, &meetup(None)).await?;
        let joined = events.join(event.id, organizer).await?;

        assert!(joined.notifications.is_empty());
        Ok(())
    }
}
