//! Presence endpoints

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use uuid::Uuid;

use super::require_auth;
use crate::{
    error::ApiResult,
    middleware::AuthUser,
    models::user_status::{UpdateStatusRequest, UserStatus},
    realtime::ServerEvent,
    state::AppState,
};

pub fn router(state: &AppState) -> Router<AppState> {
    let protected = require_auth(state, Router::new().route("/user-status", put(update_status)));

    Router::new()
        .route("/user-status/online", get(online))
        .route("/user-status/:user_id", get(status))
        .merge(protected)
}

pub async fn online(State(state): State<AppState>) -> ApiResult<Json<Vec<UserStatus>>> {
    Ok(Json(state.user_status_repository.online().await?))
}

pub async fn status(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<UserStatus>> {
    Ok(Json(state.user_status_repository.find(user_id).await?))
}

/// Set the caller's flag by hand and tell every socket
pub async fn update_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateStatusRequest>,
) -> ApiResult<Json<UserStatus>> {
    let status = state
        .user_status_repository
        .set_online(user.id, payload.is_online)
        .await?;

    state
        .hub
        .broadcast(&ServerEvent::UserStatus(status.clone()))
        .await;

    Ok(Json(status))
}
