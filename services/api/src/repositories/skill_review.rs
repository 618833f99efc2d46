//! Skill review repository

use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use super::{
    NotificationRepository, Outcome,
    review::{duplicate_review, record_rating},
};
use crate::{
    error::{ApiError, ApiResult},
    lifecycle::{Party, RequestStatus},
    models::{
        notification::{NewNotification, NotificationType},
        review::{CreateSkillReviewRequest, SkillReview},
    },
};

const SELECT_SKILL_REVIEW: &str = r#"
    SELECT rv.id, rv.skill_request_id, rv.skill_id, rv.reviewer_id,
           u.name AS reviewer_name, rv.reviewee_id, rv.rating, rv.comment, rv.created_at
    FROM skill_reviews rv
    JOIN users u ON u.id = rv.reviewer_id
"#;

#[derive(Debug, FromRow)]
struct ReviewedRequest {
    skill_id: Uuid,
    requester_id: Uuid,
    provider_id: Uuid,
    #[sqlx(try_from = "String")]
    status: RequestStatus,
    requester_reviewed: bool,
    provider_reviewed: bool,
}

/// Skill review repository
#[derive(Clone)]
pub struct SkillReviewRepository {
    pool: PgPool,
}

impl SkillReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Rate the other party of a completed skill request, once per side
    pub async fn create(
        &self,
        reviewer_id: Uuid,
        payload: &CreateSkillReviewRequest,
    ) -> ApiResult<Outcome<SkillReview>> {
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, ReviewedRequest>(
            r#"
            SELECT skill_id, requester_id, provider_id, status,
                   requester_reviewed, provider_reviewed
            FROM skill_requests
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(payload.skill_request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Skill request"))?;

        let party = Party::of(reviewer_id, request.provider_id, request.requester_id).ok_or_else(|| {
            ApiError::Forbidden("You are not a party to this skill request".to_string())
        })?;

        if request.status != RequestStatus::Completed {
            return Err(ApiError::BadRequest(
                "Only completed skill requests can be reviewed".to_string(),
            ));
        }

        let (already_reviewed, flag) = match party {
            Party::Requester => (request.requester_reviewed, "requester_reviewed"),
            Party::Owner => (request.provider_reviewed, "provider_reviewed"),
        };
        if already_reviewed {
            return Err(ApiError::Conflict(
                "You have already reviewed this request".to_string(),
            ));
        }

        let reviewee_id = party.counterpart(request.provider_id, request.requester_id);

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO skill_reviews (skill_request_id, skill_id, reviewer_id, reviewee_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(payload.skill_request_id)
        .bind(request.skill_id)
        .bind(reviewer_id)
        .bind(reviewee_id)
        .bind(payload.rating)
        .bind(payload.comment.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(duplicate_review)?;

        sqlx::query(&format!(
            "UPDATE skill_requests SET {flag} = TRUE, updated_at = NOW() WHERE id = $1"
        ))
        .bind(payload.skill_request_id)
        .execute(&mut *tx)
        .await?;

        let score = record_rating(&mut tx, reviewee_id, payload.rating).await?;

        let review = sqlx::query_as::<_, SkillReview>(&format!(
            "{SELECT_SKILL_REVIEW} WHERE rv.id = $1"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let notification = NotificationRepository::insert(
            &mut tx,
            &NewNotification::new(
                reviewee_id,
                NotificationType::Review,
                format!(
                    "{} left you a {}-star review for a skill session",
                    review.reviewer_name, review.rating
                ),
                review.id,
            ),
        )
        .await?;

        tx.commit().await?;
        info!("User {} reviewed, trust score now {:.2}", reviewee_id, score);

        Ok(Outcome::new(review, vec![notification]))
    }

    pub async fn for_user(&self, user_id: Uuid) -> ApiResult<Vec<SkillReview>> {
        let reviews = sqlx::query_as::<_, SkillReview>(&format!(
            "{SELECT_SKILL_REVIEW} WHERE rv.reviewee_id = $1 ORDER BY rv.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    pub async fn for_skill(&self, skill_id: Uuid) -> ApiResult<Vec<SkillReview>> {
        let reviews = sqlx::query_as::<_, SkillReview>(&format!(
            "{SELECT_SKILL_REVIEW} WHERE rv.skill_id = $1 ORDER BY rv.created_at DESC"
        ))
        .bind(skill_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lifecycle::RequestAction,
        models::skill::{CreateSkillRequest, NewSkillRequest},
        repositories::{SkillRepository, SkillRequestRepository},
        test_support::{insert_user, migrated_pool},
    };

    fn rating(skill_request_id: Uuid, rating: i16) -> CreateSkillReviewRequest {
        CreateSkillReviewRequest {
            skill_request_id,
            rating,
            comment: Some("Patient teacher".to_string()),
        }
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL"]
    async fn test_each_party_reviews_once() -> Result<(), Box<dyn std::error::Error>> {
        let pool = migrated_pool().await;
        let skills = SkillRepository::new(pool.clone());
        let requests = SkillRequestRepository::new(pool.clone());
        let reviews = SkillReviewRepository::new(pool.clone());

        let provider = insert_user(&pool, "Provider").await;
        let requester = insert_user(&pool, "Requester").await;

        let skill = skills
            .create(
                provider,
                &CreateSkillRequest {
                    title: "Bread baking".to_string(),
                    description: "Sourdough basics".to_string(),
                    category: "cooking".to_string(),
                    level: None,
                },
            )
            .await?;

        let request = requests
            .create(
                requester,
                &NewSkillRequest {
                    skill_id: skill.id,
                    message: None,
                    proposed_time: None,
                },
            )
            .await?
            .value;
        requests.transition(request.id, provider, RequestAction::Accept).await?;
        requests.transition(request.id, requester, RequestAction::Complete).await?;

        reviews.create(requester, &rating(request.id, 5)).await?;
        let after_first = requests.get_for_party(request.id, requester).await?;
        assert!(after_first.requester_reviewed);
        assert!(!after_first.provider_reviewed);

        let again = reviews.create(requester, &rating(request.id, 1)).await;
        assert!(matches!(again, Err(ApiError::Conflict(_))));

        let back = reviews.create(provider, &rating(request.id, 4)).await?;
        assert_eq!(back.value.reviewee_id, requester);
        let after_both = requests.get_for_party(request.id, provider).await?;
        assert!(after_both.requester_reviewed);
        assert!(after_both.provider_reviewed);

        assert_eq!(reviews.for_skill(skill.id).await?.len(), 2);
        assert_eq!(reviews.for_user(provider).await?.len(), 1);

        Ok(())
    }
}
