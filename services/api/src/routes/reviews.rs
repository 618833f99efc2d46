//! Reviews left after a completed loan

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
    models::review::{CreateReviewRequest, Review},
    state::AppState,
    validation::{DESCRIPTION_MAX, optional_text, rating},
};

pub fn router(state: &AppState) -> Router<AppState> {
    let protected = require_auth(state, Router::new().route("/reviews", post(create_review)));

    Router::new()
        .route("/reviews/user/:user_id", get(reviews_for_user))
        .merge(protected)
}

/// Review the other party of a completed borrow request
pub async fn create_review(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateReviewRequest>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    let payload = CreateReviewRequest {
        rating: rating(payload.rating)?,
        comment: optional_text("Comment", payload.comment.as_deref(), DESCRIPTION_MAX)?,
        ..payload
    };

    let outcome = state.review_repository.create(user.id, &payload).await?;
    state.push_notifications(outcome.notifications).await;

    Ok((StatusCode::CREATED, Json(outcome.value)))
}

pub async fn reviews_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Review>>> {
    Ok(Json(state.review_repository.for_user(user_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ApiError, test_support::test_state};

    #[tokio::test]
    async fn test_zero_star_review_is_rejected() {
        let result = create_review(
            State(test_state()),
            Extension(AuthUser { id: Uuid::new_v4() }),
            Json(CreateReviewRequest {
                borrow_request_id: Uuid::new_v4(),
                rating: 0,
                comment: None,
            }),
        )
        .await;

        assert!(
            matches!(result, Err(ApiError::BadRequest(msg)) if msg == "Rating must be between 1 and 5")
        );
    }
}
