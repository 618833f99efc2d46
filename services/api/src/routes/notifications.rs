//! Stored notifications

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, put},
};
use serde_json::{Value, json};
use uuid::Uuid;

use super::require_auth;
use crate::{
    error::ApiResult,
    middleware::AuthUser,
    models::{
        ListResponse,
        notification::{Notification, NotificationQuery},
    },
    state::AppState,
};

pub fn router(state: &AppState) -> Router<AppState> {
    require_auth(
        state,
        Router::new()
            .route("/notifications", get(list_notifications))
            .route("/notifications/unread-count", get(unread_count))
            .route("/notifications/read-all", put(mark_all_read))
            .route("/notifications/:id/read", put(mark_read))
            .route("/notifications/:id", delete(delete_notification)),
    )
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<ListResponse<Notification>>> {
    let page = query.page();
    let (items, total) = state
        .notification_repository
        .list(user.id, query.unread_only.unwrap_or(false), page)
        .await?;

    Ok(Json(ListResponse::new(items, page, total)))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Value>> {
    let count = state.notification_repository.unread_count(user.id).await?;
    Ok(Json(json!({ "count": count })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(state.notification_repository.mark_read(id, user.id).await?))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Value>> {
    let updated = state.notification_repository.mark_all_read(user.id).await?;
    Ok(Json(json!({ "updated": updated })))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    state.notification_repository.delete(id, user.id).await?;
    Ok(Json(json!({ "message": "Notification deleted" })))
}
