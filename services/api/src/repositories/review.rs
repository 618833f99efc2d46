//! Review repository and the trust score update shared with skill reviews

use sqlx::{FromRow, PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use super::{NotificationRepository, Outcome};
use crate::{
    error::{ApiError, ApiResult},
    lifecycle::{Party, RequestStatus, next_trust_score},
    models::{
        notification::{NewNotification, NotificationType},
        review::{CreateReviewRequest, Review},
    },
};

const SELECT_REVIEW: &str = r#"
    SELECT rv.id, rv.borrow_request_id, rv.resource_id, rv.reviewer_id,
           u.name AS reviewer_name, rv.reviewee_id, rv.rating, rv.comment, rv.created_at
    FROM reviews rv
    JOIN users u ON u.id = rv.reviewer_id
"#;

#[derive(Debug, FromRow)]
struct ReviewedRequest {
    resource_id: Uuid,
    borrower_id: Uuid,
    owner_id: Uuid,
    #[sqlx(try_from = "String")]
    status: RequestStatus,
}

/// Fold one rating into a user's trust score under a row lock; returns the new score
pub(crate) async fn record_rating(conn: &mut PgConnection, user_id: Uuid, rating: i16) -> ApiResult<f64> {
    let (trust_score, total_reviews): (f64, i32) = sqlx::query_as(
        "SELECT trust_score, total_reviews FROM users WHERE id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ApiError::not_found("User"))?;

    let score = next_trust_score(trust_score, total_reviews, rating);

    sqlx::query(
        r#"
        UPDATE users
        SET trust_score = $2, total_reviews = total_reviews + 1, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(score)
    .execute(&mut *conn)
    .await?;

    Ok(score)
}

/// Duplicate review rows surface as 409
pub(crate) fn duplicate_review(e: sqlx::Error) -> ApiError {
    let duplicate = e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());

    if duplicate {
        ApiError::Conflict("You have already reviewed this request".to_string())
    } else {
        e.into()
    }
}

/// Review repository for database operations
#[derive(Clone)]
pub struct ReviewRepository {
    pool: PgPool,
}

impl ReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Rate the other party of a completed borrow request
    pub async fn create(&self, reviewer_id: Uuid, payload: &CreateReviewRequest) -> ApiResult<Outcome<Review>> {
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, ReviewedRequest>(
            r#"
            SELECT resource_id, borrower_id, owner_id, status
            FROM borrow_requests
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(payload.borrow_request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Borrow request"))?;

        let party = Party::of(reviewer_id, request.owner_id, request.borrower_id).ok_or_else(|| {
            ApiError::Forbidden("You are not a party to this borrow request".to_string())
        })?;

        if request.status != RequestStatus::Completed {
            return Err(ApiError::BadRequest(
                "Only completed borrow requests can be reviewed".to_string(),
            ));
        }

        let reviewee_id = party.counterpart(request.owner_id, request.borrower_id);

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO reviews (borrow_request_id, resource_id, reviewer_id, reviewee_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(payload.borrow_request_id)
        .bind(request.resource_id)
        .bind(reviewer_id)
        .bind(reviewee_id)
        .bind(payload.rating)
        .bind(payload.comment.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(duplicate_review)?;

        let score = record_rating(&mut tx, reviewee_id, payload.rating).await?;

        let review = sqlx::query_as::<_, Review>(&format!("{SELECT_REVIEW} WHERE rv.id = $1"))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        let notification = NotificationRepository::insert(
            &mut tx,
            &NewNotification::new(
                reviewee_id,
                NotificationType::Review,
                format!(
                    "{} left you a {}-star review",
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

    /// Borrow reviews a user has received, newest first
    pub async fn for_user(&self, user_id: Uuid) -> ApiResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "{SELECT_REVIEW} WHERE rv.reviewee_id = $1 ORDER BY rv.created_at DESC"
        ))
        .bind(user_id)
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
        models::resource::{CreateBorrowRequest, CreateResourceRequest},
        repositories::{BorrowRequestRepository, ResourceRepository, UserRepository},
        test_support::{insert_user, migrated_pool},
    };

    /// Owner, borrower and a borrow request on a fresh resource
    async fn borrow(pool: &PgPool) -> Result<(Uuid, Uuid, Uuid), Box<dyn std::error::Error>> {
        let owner = insert_user(pool, "Owner").await;
        let borrower = insert_user(pool, "Borrower").await;

        let resource = ResourceRepository::new(pool.clone())
            .create(
                owner,
                &CreateResourceRequest {
                    title: "Tent".to_string(),
                    description: "Sleeps four".to_string(),
                    category: "outdoors".to_string(),
                    condition: None,
                    location: None,
                    image_url: None,
                },
            )
            .await?;

        let request = BorrowRequestRepository::new(pool.clone())
            .create(
                borrower,
                &CreateBorrowRequest {
                    resource_id: resource.id,
                    message: None,
                    start_date: None,
                    end_date: None,
                },
            )
            .await?
            .value;

        Ok((owner, borrower, request.id))
    }

    fn rating(borrow_request_id: Uuid, rating: i16) -> CreateReviewRequest {
        CreateReviewRequest {
            borrow_request_id,
            rating,
            comment: None,
        }
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL"]
    async fn test_review_updates_trust_score_once() -> Result<(), Box<dyn std::error::Error>> {
        let pool = migrated_pool().await;
        let requests = BorrowRequestRepository::new(pool.clone());
        let reviews = ReviewRepository::new(pool.clone());
        let users = UserRepository::new(pool.clone());

        let (owner, borrower, request_id) = borrow(&pool).await?;

        let early = reviews.create(borrower, &rating(request_id, 4)).await;
        assert!(matches!(early, Err(ApiError::BadRequest(_))));

        requests.transition(request_id, owner, RequestAction::Accept).await?;
        requests.transition(request_id, owner, RequestAction::Complete).await?;

        let review = reviews.create(borrower, &rating(request_id, 4)).await?;
        assert_eq!(review.value.reviewee_id, owner);
        assert_eq!(review.notifications[0].user_id, owner);

        let profile = users.profile(owner).await?;
        assert_eq!(profile.total_reviews, 1);
        assert_eq!(profile.trust_score, 4.0);

        let again = reviews.create(borrower, &rating(request_id, 2)).await;
        assert!(matches!(again, Err(ApiError::Conflict(_))));
        assert_eq!(users.profile(owner).await?.total_reviews, 1);

        let back = reviews.create(owner, &rating(request_id, 5)).await?;
        assert_eq!(back.value.reviewee_id, borrower);
        assert_eq!(reviews.for_user(borrower).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL"]
    async fn test_outsider_cannot_review() -> Result<(), Box<dyn std::error::Error>> {
        let pool = migrated_pool().await;
        let (_, _, request_id) = borrow(&pool).await?;
        let outsider = insert_user(&pool, "Outsider").await;

        let result = ReviewRepository::new(pool.clone())
            .create(outsider, &rating(request_id, 3))
            .await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));

        Ok(())
    }
}
