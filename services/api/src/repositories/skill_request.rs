//! Skill request repository
//!
//! Accepting books the skill for the requester and completing releases it;
//! both happen in the same transaction as the status change.

use sqlx::{FromRow, PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use super::{Direction, NotificationRepository, Outcome, skill::SkillLock};
use crate::{
    error::{ApiError, ApiResult},
    lifecycle::{Party, RequestAction, RequestStatus},
    models::{
        Page,
        notification::{NewNotification, NotificationType},
        skill::{NewSkillRequest, SkillAvailability, SkillRequest},
    },
};

pub(crate) const SELECT_SKILL_REQUEST: &str = r#"
    SELECT sr.id, sr.skill_id, s.title AS skill_title,
           sr.requester_id, rq.name AS requester_name,
           sr.provider_id, pv.name AS provider_name,
           sr.message, sr.proposed_time, sr.status,
           sr.requester_reviewed, sr.provider_reviewed,
           sr.created_at, sr.updated_at
    FROM skill_requests sr
    JOIN skills s ON s.id = sr.skill_id
    JOIN users rq ON rq.id = sr.requester_id
    JOIN users pv ON pv.id = sr.provider_id
"#;

#[derive(Debug, FromRow)]
struct RequestLock {
    skill_id: Uuid,
    requester_id: Uuid,
    provider_id: Uuid,
    #[sqlx(try_from = "String")]
    status: RequestStatus,
}

fn party_column(direction: Direction) -> &'static str {
    match direction {
        Direction::Incoming => "sr.provider_id",
        Direction::Outgoing => "sr.requester_id",
    }
}

/// Skill request repository
#[derive(Clone)]
pub struct SkillRequestRepository {
    pool: PgPool,
}

impl SkillRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) async fn fetch(conn: &mut PgConnection, id: Uuid) -> ApiResult<SkillRequest> {
        sqlx::query_as::<_, SkillRequest>(&format!("{SELECT_SKILL_REQUEST} WHERE sr.id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| ApiError::not_found("Skill request"))
    }

    /// Ask to book an available skill offered by someone else
    pub async fn create(
        &self,
        requester_id: Uuid,
        payload: &NewSkillRequest,
    ) -> ApiResult<Outcome<SkillRequest>> {
        let mut tx = self.pool.begin().await?;
        let skill = SkillLock::acquire(&mut tx, payload.skill_id).await?;

        if skill.user_id == requester_id {
            return Err(ApiError::BadRequest(
                "You cannot request your own skill".to_string(),
            ));
        }
        if skill.availability != SkillAvailability::Available {
            return Err(ApiError::BadRequest(
                "Skill is not available".to_string(),
            ));
        }

        let pending: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM skill_requests
                WHERE skill_id = $1 AND requester_id = $2 AND status = 'pending'
            )
            "#,
        )
        .bind(payload.skill_id)
        .bind(requester_id)
        .fetch_one(&mut *tx)
        .await?;

        if pending {
            return Err(ApiError::Conflict(
                "You already have a pending request for this skill".to_string(),
            ));
        }

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO skill_requests (skill_id, requester_id, provider_id, message, proposed_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(payload.skill_id)
        .bind(requester_id)
        .bind(skill.user_id)
        .bind(payload.message.as_deref())
        .bind(payload.proposed_time)
        .fetch_one(&mut *tx)
        .await?;

        let request = Self::fetch(&mut tx, id).await?;
        let notification = NotificationRepository::insert(
            &mut tx,
            &NewNotification::new(
                request.provider_id,
                NotificationType::SkillRequest,
                format!(
                    "{} would like to book your skill {}",
                    request.requester_name, request.skill_title
                ),
                request.id,
            ),
        )
        .await?;

        tx.commit().await?;
        info!("Skill request {} created for skill {}", request.id, request.skill_id);

        Ok(Outcome::new(request, vec![notification]))
    }

    /// Fetch a request visible to one of its parties
    pub async fn get_for_party(&self, id: Uuid, user_id: Uuid) -> ApiResult<SkillRequest> {
        let mut conn = self.pool.acquire().await?;
        let request = Self::fetch(&mut conn, id).await?;

        if request.provider_id != user_id && request.requester_id != user_id {
            return Err(ApiError::Forbidden(
                "You are not a party to this skill request".to_string(),
            ));
        }

        Ok(request)
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        direction: Direction,
        page: Page,
    ) -> ApiResult<(Vec<SkillRequest>, i64)> {
        let column = party_column(direction);

        let items = sqlx::query_as::<_, SkillRequest>(&format!(
            "{SELECT_SKILL_REQUEST} WHERE {column} = $1 ORDER BY sr.created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM skill_requests sr WHERE {column} = $1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total))
    }

    /// Move a request through its lifecycle on behalf of `user_id`
    pub async fn transition(
        &self,
        id: Uuid,
        user_id: Uuid,
        action: RequestAction,
    ) -> ApiResult<Outcome<SkillRequest>> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, RequestLock>(
            r#"
            SELECT skill_id, requester_id, provider_id, status
            FROM skill_requests
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Skill request"))?;

        let party = Party::of(user_id, current.provider_id, current.requester_id).ok_or_else(|| {
            ApiError::Forbidden("You are not a party to this skill request".to_string())
        })?;
        let next = current.status.apply(action, party)?;

        match action {
            RequestAction::Accept => {
                let skill = SkillLock::acquire(&mut tx, current.skill_id).await?;
                if skill.availability != SkillAvailability::Available {
                    return Err(ApiError::BadRequest(
                        "Skill is no longer available".to_string(),
                    ));
                }

                sqlx::query(
                    r#"
                    UPDATE skills
                    SET availability = 'booked', booked_by = $2, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(current.skill_id)
                .bind(current.requester_id)
                .execute(&mut *tx)
                .await?;
            }
            RequestAction::Complete => {
                SkillLock::acquire(&mut tx, current.skill_id).await?;

                sqlx::query(
                    r#"
                    UPDATE skills
                    SET availability = 'available', booked_by = NULL, updated_at = NOW()
                    WHERE id = $1 AND availability = 'booked'
                    "#,
                )
                .bind(current.skill_id)
                .execute(&mut *tx)
                .await?;
            }
            RequestAction::Decline | RequestAction::Cancel => {}
        }

        sqlx::query("UPDATE skill_requests SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await?;

        let request = Self::fetch(&mut tx, id).await?;

        let notice = match action {
            RequestAction::Accept => Some((
                NotificationType::SkillAccepted,
                format!(
                    "{} accepted your request for {}",
                    request.provider_name, request.skill_title
                ),
            )),
            RequestAction::Decline => Some((
                NotificationType::SkillDeclined,
                format!(
                    "{} declined your request for {}",
                    request.provider_name, request.skill_title
                ),
            )),
            RequestAction::Complete => Some((
                NotificationType::SkillCompleted,
                format!(
                    "The session for {} has been completed. You can now leave a review",
                    request.skill_title
                ),
            )),
            RequestAction::Cancel => None,
        };

        let mut notifications = Vec::new();
        if let Some((kind, message)) = notice {
            let recipient = party.counterpart(current.provider_id, current.requester_id);
            let notification = NotificationRepository::insert(
                &mut tx,
                &NewNotification::new(recipient, kind, message, request.id),
            )
            .await?;
            notifications.push(notification);
        }

        tx.commit().await?;
        info!("Skill request {} moved from {} to {}", id, current.status, next);

        Ok(Outcome::new(request, notifications))
    }
}
