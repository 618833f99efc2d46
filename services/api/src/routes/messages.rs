//! Direct messages between members

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};
use uuid::Uuid;

use super::require_auth;
use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::{
        ListResponse, PageQuery,
        message::{ConversationSummary, Message, SendMessageRequest},
    },
    realtime::ServerEvent,
    state::AppState,
    validation::{MESSAGE_MAX, required_text},
};

pub fn router(state: &AppState) -> Router<AppState> {
    require_auth(
        state,
        Router::new()
            .route("/messages", post(send_message))
            .route("/messages/conversations", get(conversations))
            .route("/messages/conversations/:user_id", get(thread))
            .route("/messages/conversations/:user_id/read", put(mark_thread_read))
            .route("/messages/unread-count", get(unread_count))
            .route("/messages/:id/read", put(mark_read))
            .route("/messages/:id", delete(delete_message)),
    )
}

/// Send a message; both parties' sockets receive it
pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    if payload.recipient_id == user.id {
        return Err(ApiError::BadRequest(
            "You cannot send a message to yourself".to_string(),
        ));
    }
    let content = required_text("Message content", &payload.content, MESSAGE_MAX)?;

    let outcome = state
        .message_repository
        .send(user.id, payload.recipient_id, &content)
        .await?;

    let event = ServerEvent::Message(outcome.value.clone());
    state.hub.emit_to_user(outcome.value.recipient_id, &event).await;
    state.hub.emit_to_user(outcome.value.sender_id, &event).await;
    state.push_notifications(outcome.notifications).await;

    Ok((StatusCode::CREATED, Json(outcome.value)))
}

/// Latest message per partner
pub async fn conversations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(state.message_repository.conversations(user.id).await?))
}

/// Thread with one partner, oldest first within the page
pub async fn thread(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(partner_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ListResponse<Message>>> {
    if !state.user_repository.exists(partner_id).await? {
        return Err(ApiError::not_found("User"));
    }

    let page = query.page();
    let (items, total) = state
        .message_repository
        .thread(user.id, partner_id, page)
        .await?;

    Ok(Json(ListResponse::new(items, page, total)))
}

pub async fn mark_thread_read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(partner_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let updated = state
        .message_repository
        .mark_thread_read(user.id, partner_id)
        .await?;

    Ok(Json(json!({ "updated": updated })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Message>> {
    Ok(Json(state.message_repository.mark_read(id, user.id).await?))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    state.message_repository.delete(id, user.id).await?;
    Ok(Json(json!({ "message": "Message deleted" })))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Value>> {
    let count = state.message_repository.unread_count(user.id).await?;
    Ok(Json(json!({ "count": count })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;

    #[tokio::test]
    async fn test_messaging_yourself_is_rejected() {
        let me = Uuid::new_v4();
        let result = send_message(
            State(test_state()),
            Extension(AuthUser { id: me }),
            Json(SendMessageRequest {
                recipient_id: me,
                content: "hello".to_string(),
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_blank_and_overlong_content_is_rejected() {
        let state = test_state();

        for content in ["   ".to_string(), "x".repeat(MESSAGE_MAX + 1)] {
            let result = send_message(
                State(state.clone()),
                Extension(AuthUser { id: Uuid::new_v4() }),
                Json(SendMessageRequest {
                    recipient_id: Uuid::new_v4(),
                    content,
                }),
            )
            .await;

            assert!(matches!(result, Err(ApiError::BadRequest(_))));
        }
    }
}
