//! Skill request lifecycle

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
        skill::{NewSkillRequest, SkillRequest},
    },
    repositories::Direction,
    state::AppState,
    validation::{MESSAGE_MAX, optional_text},
};

pub fn router(state: &AppState) -> Router<AppState> {
    require_auth(
        state,
        Router::new()
            .route("/skill-requests", post(create_request))
            .route("/skill-requests/incoming", get(incoming))
            .route("/skill-requests/outgoing", get(outgoing))
            .route("/skill-requests/:id", get(get_request))
            .route("/skill-requests/:id/accept", put(accept))
            .route("/skill-requests/:id/decline", put(decline))
            .route("/skill-requests/:id/cancel", put(cancel))
            .route("/skill-requests/:id/complete", put(complete)),
    )
}

/// Ask a provider for a session
pub async fn create_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<NewSkillRequest>,
) -> ApiResult<(StatusCode, Json<SkillRequest>)> {
    let payload = NewSkillRequest {
        message: optional_text("Message", payload.message.as_deref(), MESSAGE_MAX)?,
        ..payload
    };

    let outcome = state
        .skill_request_repository
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
) -> ApiResult<Json<ListResponse<SkillRequest>>> {
    let page = query.page();
    let (items, total) = state
        .skill_request_repository
        .list(user.id, direction, page)
        .await?;

    Ok(Json(ListResponse::new(items, page, total)))
}

/// Requests for the caller's skills
pub async fn incoming(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ListResponse<SkillRequest>>> {
    list(&state, user, Direction::Incoming, &query).await
}

/// Requests the caller has made
pub async fn outgoing(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ListResponse<SkillRequest>>> {
    list(&state, user, Direction::Outgoing, &query).await
}

pub async fn get_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SkillRequest>> {
    Ok(Json(
        state.skill_request_repository.get_for_party(id, user.id).await?,
    ))
}

async fn transition(
    state: AppState,
    user: AuthUser,
    id: Uuid,
    action: RequestAction,
) -> ApiResult<Json<SkillRequest>> {
    let outcome = state
        .skill_request_repository
        .transition(id, user.id, action)
        .await?;
    state.push_notifications(outcome.notifications).await;

    Ok(Json(outcome.value))
}

pub async fn accept(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SkillRequest>> {
    transition(state, user, id, RequestAction::Accept).await
}

pub async fn decline(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SkillRequest>> {
    transition(state, user, id, RequestAction::Decline).await
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SkillRequest>> {
    transition(state, user, id, RequestAction::Cancel).await
}

pub async fn complete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SkillRequest>> {
    transition(state, user, id, RequestAction::Complete).await
}
