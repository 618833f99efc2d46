//! Borrow request lifecycle

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use uuid::Uuid;

use super::require_auth;
use crate::{
    error::ApiResult,
    lifecycle::RequestAction,
    middleware::AuthUser,
    models::{
        ListResponse, PageQuery,
        resource::{BorrowRequest, CreateBorrowRequest},
    },
    repositories::Direction,
    state::AppState,
    validation::{MESSAGE_MAX, optional_text},
};

pub fn router(state: &AppState) -> Router<AppState> {
    require_auth(
        state,
        Router::new()
            .route("/borrow-requests", post(create_request))
            .route("/borrow-requests/incoming", get(incoming))
            .route("/borrow-requests/outgoing", get(outgoing))
            .route("/borrow-requests/:id", get(get_request))
            .route("/borrow-requests/:id/accept", put(accept))
            .route("/borrow-requests/:id/decline", put(decline))
            .route("/borrow-requests/:id/cancel", put(cancel))
            .route("/borrow-requests/:id/complete", put(complete)),
    )
}

/// Ask an owner to lend a resource
pub async fn create_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateBorrowRequest>,
) -> ApiResult<(StatusCode, Json<BorrowRequest>)> {
    let payload = CreateBorrowRequest {
        message: optional_text("Message", payload.message.as_deref(), MESSAGE_MAX)?,
        ..payload
    };

    let outcome = state
        .borrow_request_repository
        .create(user.id, &payload)
        .await?;
    state.push_notifications(outcome.notifications).await;

    Ok((StatusCode::CREATED, Json(outcome.value)))
}

async fn list(
    state: &AppState,
    user: AuthUser,
    direction: Direction,
    query: &PageQuery,
) -> ApiResult<Json<ListResponse<BorrowRequest>>> {
    let page = query.page();
    let (items, total) = state
        .borrow_request_repository
        .list(user.id, direction, page)
        .await?;

    Ok(Json(ListResponse::new(items, page, total)))
}

/// Requests for resources the caller owns
pub async fn incoming(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ListResponse<BorrowRequest>>> {
    list(&state, user, Direction::Incoming, &query).await
}

/// Requests the caller has made
pub async fn outgoing(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ListResponse<BorrowRequest>>> {
    list(&state, user, Direction::Outgoing, &query).await
}

pub async fn get_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BorrowRequest>> {
    Ok(Json(
        state.borrow_request_repository.get_for_party(id, user.id).await?,
    ))
}

async fn transition(
    state: AppState,
    user: AuthUser,
    id: Uuid,
    action: RequestAction,
) -> ApiResult<Json<BorrowRequest>> {
    let outcome = state
        .borrow_request_repository
        .transition(id, user.id, action)
        .await?;
    state.push_notifications(outcome.notifications).await;

    if matches!(action, RequestAction::Accept | RequestAction::Complete) {
        state.broadcast_resource(outcome.value.resource_id).await;
    }

    Ok(Json(outcome.value))
}

pub async fn accept(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BorrowRequest>> {
    transition(state, user, id, RequestAction::Accept).await
}

pub async fn decline(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BorrowRequest>> {
    transition(state, user, id, RequestAction::Decline).await
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BorrowRequest>> {
    transition(state, user, id, RequestAction::Cancel).await
}

pub async fn complete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BorrowRequest>> {
    transition(state, user, id, RequestAction::Complete).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ApiError, test_support::test_state};

    #[tokio::test]
    async fn test_overlong_message_is_rejected_before_touching_the_database() {
        let result = create_request(
            State(test_state()),
            Extension(AuthUser { id: Uuid::new_v4() }),
            Json(CreateBorrowRequest {
                resource_id: Uuid::new_v4(),
                message: Some("x".repeat(MESSAGE_MAX + 1)),
                start_date: None,
                end_date: None,
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
