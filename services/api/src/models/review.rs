//! Reviews left after a completed borrow or skill session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Review of a completed borrow request
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub borrow_request_id: Uuid,
    pub resource_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewer_name: String,
    pub reviewee_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /reviews`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub borrow_request_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
}

/// Review of a completed skill request
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SkillReview {
    pub id: Uuid,
    pub skill_request_id: Uuid,
    pub skill_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewer_name: String,
    pub reviewee_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /skill-reviews`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSkillReviewRequest {
    pub skill_request_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
}

/// Everything a user has been rated on
#[derive(Debug, Clone, Serialize)]
pub struct ReceivedReviews {
    pub user_id: Uuid,
    pub trust_score: f64,
    pub total_reviews: i32,
    pub borrow_reviews: Vec<Review>,
    pub skill_reviews: Vec<SkillReview>,
}
