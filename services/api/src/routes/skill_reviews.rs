//! Reviews left after a completed skill session

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use super::require_auth;
use crate::{
    error::ApiResult,
    middleware::AuthUser,
    models::review::{CreateSkillReviewRequest, SkillReview},
    state::AppState,
    validation::{DESCRIPTION_MAX, optional_text, rating},
};

pub fn router(state: &AppState) -> Router<AppState> {
    let protected = require_auth(
        state,
        Router::new().route("/skill-reviews", post(create_skill_review)),
    );

    Router::new()
        .route("/skill-reviews/user/:user_id", get(reviews_for_user))
        .route("/skill-reviews/skill/:skill_id", get(reviews_for_skill))
        .merge(protected)
}

/// Review the other party of a completed skill request
pub async fn create_skill_review(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateSkillReviewRequest>,
) -> ApiResult<(StatusCode, Json<SkillReview>)> {
    let payload = CreateSkillReviewRequest {
        rating: rating(payload.rating)?,
        comment: optional_text("Comment", payload.comment.as_deref(), DESCRIPTION_MAX)?,
        ..payload
    };

    let outcome = state
        .skill_review_repository
        .create(user.id, &payload)
        .await?;
    state.push_notifications(outcome.notifications).await;

    Ok((StatusCode::CREATED, Json(outcome.value)))
}

pub async fn reviews_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<SkillReview>>> {
    Ok(Json(state.skill_review_repository.for_user(user_id).await?))
}

pub async fn reviews_for_skill(
    State(state): State<AppState>,
    Path(skill_id): Path<Uuid>,
) -> ApiResult<Json<Vec<SkillReview>>> {
    Ok(Json(state.skill_review_repository.for_skill(skill_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ApiError, test_support::test_state};

    #[tokio::test]
    async fn test_six_star_review_is_rejected() {
        let result = create_skill_review(
            State(test_state()),
            Extension(AuthUser { id: Uuid::new_v4() }),
            Json(CreateSkillReviewRequest {
                skill_request_id: Uuid::new_v4(),
                rating: 6,
                comment: Some("Great lesson".to_string()),
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
